use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Base name of the backend executable.  The platform extension is tried as
/// a fallback by [`resolve_executable`].
pub const BACKEND_BINARY_NAME: &str = "music_player";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/deck/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("deck")
    }
    #[cfg(windows)]
    {
        // Portable data directory beside the executable wins
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let portable_data = exe_dir.join("data");
                if portable_data.exists() {
                    return portable_data;
                }
            }
        }

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deck")
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                if exe_dir.join("config.toml").exists() {
                    return exe_dir.to_path_buf();
                }
            }
        }
    }

    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("deck")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deck")
    }
}

/// Candidate paths for the backend executable, in lookup order: the
/// configured path as-is, then with the platform executable extension
/// appended (people often build `music_player` on Windows without `.exe`,
/// or configure the name without it).
pub fn executable_candidates(base: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![base.to_path_buf()];
    let suffix = std::env::consts::EXE_SUFFIX;
    if !suffix.is_empty() {
        let mut with_ext = OsString::from(base.as_os_str());
        with_ext.push(suffix);
        candidates.push(PathBuf::from(with_ext));
    }
    candidates
}

/// Resolve the backend executable.  `None` if no candidate is a file.
pub fn resolve_executable(base: &Path) -> Option<PathBuf> {
    executable_candidates(base).into_iter().find(|p| p.is_file())
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend executable.  If missing, the same path plus the platform
    /// executable extension is tried.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Extra arguments passed to the backend.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the backend; it opens `songs.txt` relative to it.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// How long shutdown waits for the backend to exit after stdin closes
    /// before killing it.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where uploaded tracks and the song list live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,
    #[serde(default = "default_songs_file")]
    pub songs_file: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            args: Vec::new(),
            working_dir: default_working_dir(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            songs_file: default_songs_file(),
        }
    }
}

fn default_executable() -> PathBuf {
    platform::data_dir().join(platform::BACKEND_BINARY_NAME)
}

fn default_working_dir() -> PathBuf {
    platform::data_dir()
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    platform::DEFAULT_HTTP_PORT
}

fn default_music_dir() -> PathBuf {
    platform::data_dir().join("static").join("music")
}

fn default_songs_file() -> PathBuf {
    platform::data_dir().join("songs.txt")
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert!(config.backend.executable.ends_with("deck/music_player"));
        assert!(config.library.songs_file.ends_with("deck/songs.txt"));
        assert!(config.library.music_dir.ends_with("static/music"));
        assert_eq!(config.backend.shutdown_grace_ms, 2000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[backend]\nexecutable = \"/opt/player/music_player\"\n\n[http]\nport = 8080\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(
            config.backend.executable,
            PathBuf::from("/opt/player/music_player")
        );
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert!(config.library.songs_file.ends_with("songs.txt"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.backend.shutdown_grace_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.backend.shutdown_grace_ms, 250);
    }
}

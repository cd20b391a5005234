//! Song list flat file (`songs.txt`): one track filename per line.
//!
//! The backend reads this file on startup and on reload; the daemon only
//! appends uploaded tracks and removes deleted ones.  Mutations are
//! serialised through an async lock so an upload and a delete racing each
//! other cannot lose a line.
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct SongList {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SongList {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file (and its parent dir) if it does not exist yet.
    pub async fn ensure_exists(&self) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(&self.path).await? {
            tokio::fs::write(&self.path, "").await?;
            info!("Created song list {:?}", self.path);
        }
        Ok(())
    }

    pub async fn read_songs(&self) -> anyhow::Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let content = read_or_empty(&self.path).await?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Append one filename.  A file whose last line lacks a newline (hand
    /// edited) gets one first so the two names don't merge.
    pub async fn append_song(&self, filename: &str) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let content = read_or_empty(&self.path).await?;
        let prefix = if !content.is_empty() && !content.ends_with('\n') {
            "\n"
        } else {
            ""
        };

        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        f.write_all(format!("{}{}\n", prefix, filename).as_bytes())
            .await?;
        f.flush().await?;
        debug!("Appended {:?} to song list", filename);
        Ok(())
    }

    /// Drop every line naming `filename`.  Returns whether anything was removed.
    pub async fn remove_song(&self, filename: &str) -> anyhow::Result<bool> {
        let _guard = self.lock.lock().await;
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(false);
        }
        let content = tokio::fs::read_to_string(&self.path).await?;

        let kept: Vec<&str> = content
            .lines()
            .filter(|line| line.trim() != filename)
            .collect();
        let removed = kept.len() != content.lines().count();
        if !removed {
            return Ok(false);
        }

        let mut new_content = kept.join("\n");
        if !new_content.is_empty() {
            new_content.push('\n');
        }
        tokio::fs::write(&self.path, new_content).await?;
        debug!("Removed {:?} from song list", filename);
        Ok(true)
    }
}

async fn read_or_empty(path: &Path) -> anyhow::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Reduce a client-supplied file name to a bare name safe to join onto the
/// music directory.  `None` for names with nothing usable left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if base.is_empty() || base == "." || base == ".." || base.contains(['\n', '\r', '\0']) {
        return None;
    }
    Some(base.to_string())
}

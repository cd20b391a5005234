//! Stub backends for supervisor, bridge and HTTP tests.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use deck_proto::config::BackendConfig;
use tempfile::TempDir;

use crate::supervisor::Supervisor;

const DEADLINE: Duration = Duration::from_secs(5);

/// A supervisor whose backend is `script`, run by `/bin/sh` inside `dir`.
/// Going through the shell avoids exec'ing a freshly written file.
pub fn stub_supervisor(dir: &TempDir, script: &str) -> Supervisor {
    let path = dir.path().join("backend.sh");
    std::fs::write(&path, format!("{}\n", script)).unwrap();
    let config = BackendConfig {
        executable: PathBuf::from("/bin/sh"),
        args: vec![path.display().to_string()],
        working_dir: dir.path().to_path_buf(),
        shutdown_grace_ms: 500,
    };
    Supervisor::new(config, Arc::default(), Arc::default())
}

/// Poll until at least `n` lines arrived (or the deadline passes).
pub async fn collect_lines(sup: &Supervisor, n: usize) -> Vec<String> {
    let start = tokio::time::Instant::now();
    let mut lines = Vec::new();
    while lines.len() < n && start.elapsed() < DEADLINE {
        lines.extend(sup.drain_output().await.lines);
        if lines.len() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    lines
}

pub async fn wait_until_dead(sup: &Supervisor) {
    let start = tokio::time::Instant::now();
    while sup.is_alive().await {
        assert!(start.elapsed() < DEADLINE, "backend did not exit");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Backend process supervisor.
///
/// Architecture:
///
/// ```text
///   Supervisor::start()
///         │
///         ├── child process     ← owned here, never shared
///         ├── stdin             ← behind a mutex; send_command() writes + flushes
///         ├── reader_task       ← reads stdout lines until EOF
///         │                          ├── decode → LineChannel (every non-blank line)
///         │                          └── now-playing → PlaybackState
///         └── stderr_task       ← drains stderr into the daemon log
/// ```
///
/// Lifecycle: NotStarted → Running → Exited.  There is no automatic restart;
/// a new `start()` (or `restart()`) launches a fresh process.
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use deck_proto::channel::LineChannel;
use deck_proto::config::BackendConfig;
use deck_proto::error::BridgeError;
use deck_proto::platform;
use deck_proto::protocol::{decode, DecodedEvent};
use deck_proto::state::{BackendHealth, PlaybackState};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A single command write (plus flush) must finish within this window.
#[cfg(not(test))]
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
#[cfg(test)]
const WRITE_TIMEOUT: Duration = Duration::from_millis(300);

/// Lines drained in one poll, plus the track playing at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBatch {
    pub lines: Vec<String>,
    pub current_track: String,
}

/// One launched backend instance and the tasks draining its pipes.
struct Backend {
    child: Child,
    reader: JoinHandle<()>,
    stderr: JoinHandle<()>,
}

impl Backend {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

pub struct Supervisor {
    config: BackendConfig,
    channel: Arc<LineChannel>,
    state: Arc<PlaybackState>,
    backend: Mutex<Option<Backend>>,
    /// Separate from `backend` so a slow write never holds up liveness checks.
    stdin: Mutex<Option<ChildStdin>>,
}

impl Supervisor {
    pub fn new(
        config: BackendConfig,
        channel: Arc<LineChannel>,
        state: Arc<PlaybackState>,
    ) -> Self {
        Self {
            config,
            channel,
            state,
            backend: Mutex::new(None),
            stdin: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<PlaybackState> {
        &self.state
    }

    // ── lifecycle ─────────────────────────────────────────────────────────────

    /// Launch the backend and its reader.  At most one instance runs at a time.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let mut slot = self.backend.lock().await;

        if let Some(backend) = slot.as_mut() {
            if backend.is_alive() {
                return Err(BridgeError::AlreadyRunning);
            }
        }
        if let Some(old) = slot.take() {
            self.reap(old).await;
        }

        let exe = platform::resolve_executable(&self.config.executable).ok_or_else(|| {
            error!(
                "Backend executable not found: {:?} (compile it first, e.g. gcc music_player_backend.c -o music_player)",
                self.config.executable
            );
            BridgeError::NotFound(self.config.executable.clone())
        })?;

        info!("Spawning backend {:?}", exe);
        let mut child = tokio::process::Command::new(&exe)
            .args(&self.config.args)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to launch backend {:?}: {}", exe, e);
                BridgeError::LaunchFailed(e)
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill().await;
            return Err(BridgeError::LaunchFailed(std::io::Error::new(
                std::io::ErrorKind::Other,
                "backend pipes not captured",
            )));
        };

        // Running must be recorded before the reader exists, so a backend that
        // dies instantly still ends up Exited.
        self.state.set_backend(BackendHealth::Running).await;
        *self.stdin.lock().await = Some(stdin);

        let reader = tokio::spawn(reader_task(
            BufReader::new(stdout),
            self.channel.clone(),
            self.state.clone(),
        ));
        let stderr = tokio::spawn(stderr_task(BufReader::new(stderr)));

        info!("Backend started (pid {:?})", child.id());
        *slot = Some(Backend {
            child,
            reader,
            stderr,
        });
        Ok(())
    }

    /// Close stdin and let the backend exit on its own; kill it only if it
    /// outlives the grace period.  Waits for the reader to finish.
    pub async fn shutdown(&self) {
        let backend = self.backend.lock().await.take();
        let Some(mut backend) = backend else {
            return;
        };

        // Dropping our end of stdin is the backend's EOF.
        self.stdin.lock().await.take();

        let grace = self.grace();
        match tokio::time::timeout(grace, backend.child.wait()).await {
            Ok(Ok(status)) => info!("Backend exited: {}", status),
            Ok(Err(e)) => warn!("Failed to wait for backend: {}", e),
            Err(_) => {
                warn!("Backend did not exit within {:?}, killing it", grace);
                if let Err(e) = backend.child.kill().await {
                    warn!("Failed to kill backend: {}", e);
                }
            }
        }

        self.finish_tasks(backend).await;
        self.state.set_backend(BackendHealth::Exited).await;
    }

    /// Explicit, externally requested restart.
    pub async fn restart(&self) -> Result<(), BridgeError> {
        info!("Restarting backend");
        self.shutdown().await;
        self.start().await
    }

    /// Clean up an instance that already exited on its own.
    async fn reap(&self, mut old: Backend) {
        self.stdin.lock().await.take();
        match old.child.wait().await {
            Ok(status) => debug!("Reaped previous backend: {}", status),
            Err(e) => warn!("Failed to reap previous backend: {}", e),
        }
        self.finish_tasks(old).await;
    }

    async fn finish_tasks(&self, mut backend: Backend) {
        let grace = self.grace();
        if tokio::time::timeout(grace, &mut backend.reader).await.is_err() {
            // stdout is still held open by something the backend spawned
            warn!("Backend reader still running after exit, aborting it");
            backend.reader.abort();
        }
        if tokio::time::timeout(grace, &mut backend.stderr).await.is_err() {
            backend.stderr.abort();
        }
    }

    fn grace(&self) -> Duration {
        Duration::from_millis(self.config.shutdown_grace_ms)
    }

    // ── queries ───────────────────────────────────────────────────────────────

    /// True iff a backend was started and has not exited.  Never waits on the
    /// process.  The recorded health is brought in line with what the process
    /// check finds: a backend that closed stdout but still runs is Running.
    pub async fn is_alive(&self) -> bool {
        let mut slot = self.backend.lock().await;
        match slot.as_mut() {
            Some(backend) => {
                let alive = backend.is_alive();
                let health = if alive {
                    BackendHealth::Running
                } else {
                    BackendHealth::Exited
                };
                self.state.set_backend(health).await;
                alive
            }
            None => false,
        }
    }

    pub async fn pid(&self) -> Option<u32> {
        self.backend.lock().await.as_ref().and_then(|b| b.child.id())
    }

    /// Take everything the backend printed since the last poll.
    pub async fn drain_output(&self) -> OutputBatch {
        let lines = self.channel.drain_all().await;
        let current_track = self.state.current_track().await;
        OutputBatch {
            lines,
            current_track,
        }
    }

    // ── commands ──────────────────────────────────────────────────────────────

    /// Write one command line and flush it.  Concurrent callers are
    /// serialised, so lines never interleave on the pipe.
    pub async fn send_command(&self, text: &str) -> Result<(), BridgeError> {
        let body = text.strip_suffix('\n').unwrap_or(text);
        if body.contains(['\n', '\r']) {
            return Err(BridgeError::InvalidCommand(text.to_string()));
        }

        if !self.is_alive().await {
            return Err(BridgeError::NoBackend);
        }

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(BridgeError::NoBackend)?;

        let line = format!("{}\n", body);
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        };
        let result = match tokio::time::timeout(WRITE_TIMEOUT, write).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "backend did not accept input",
            )),
        };

        match result {
            Ok(()) => {
                debug!("Sent to backend: {}", body);
                Ok(())
            }
            Err(e) => {
                warn!("Write to backend failed: {}", e);
                Err(BridgeError::WriteFailed(e))
            }
        }
    }
}

// ── reader tasks ──────────────────────────────────────────────────────────────

/// Decode one stdout line: enqueue it for pollers and fold any state change.
pub async fn ingest_line(raw: &str, channel: &LineChannel, state: &PlaybackState) {
    let Some(event) = decode(raw) else {
        return;
    };
    match &event {
        DecodedEvent::Error(line) => warn!(target: "backend", "{}", line),
        DecodedEvent::LibraryEntry { id, title, .. } => {
            debug!(target: "backend", "library row {}: {}", id, title)
        }
        DecodedEvent::SearchMatch { id, title, .. } => {
            debug!(target: "backend", "search match {}: {}", id, title)
        }
        other => info!(target: "backend", "{}", other.line()),
    }
    state.apply(&event).await;
    channel.enqueue(event.into_line());
}

async fn reader_task<R>(mut reader: BufReader<R>, channel: Arc<LineChannel>, state: Arc<PlaybackState>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("Backend reader: stdout closed");
                break;
            }
            Ok(_) => {
                // Filenames are not guaranteed to be UTF-8.
                let line = String::from_utf8_lossy(&buf);
                ingest_line(&line, &channel, &state).await;
            }
            Err(e) => {
                warn!("Backend reader: read error: {}", e);
                break;
            }
        }
    }
    state.set_backend(BackendHealth::Exited).await;
    info!("Backend output closed, reader exiting");
}

async fn stderr_task<R>(mut reader: BufReader<R>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if !line.is_empty() {
                    warn!(target: "backend_stderr", "{}", line);
                }
            }
        }
    }
}

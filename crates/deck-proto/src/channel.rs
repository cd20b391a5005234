use tokio::sync::{mpsc, Mutex};

/// Unbounded FIFO of backend output lines.
///
/// One producer (the supervisor's reader task) enqueues; any number of
/// request handlers drain.  Each line is handed to exactly one `drain_all`.
pub struct LineChannel {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl LineChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Never blocks.  The receiver lives as long as `self`, so the send
    /// cannot fail.
    pub fn enqueue(&self, line: String) {
        let _ = self.tx.send(line);
    }

    /// Remove and return everything buffered right now, oldest first.
    pub async fn drain_all(&self) -> Vec<String> {
        let mut rx = self.rx.lock().await;
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }
}

impl Default for LineChannel {
    fn default() -> Self {
        Self::new()
    }
}

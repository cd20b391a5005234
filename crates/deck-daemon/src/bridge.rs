use std::sync::Arc;

use deck_proto::error::BridgeError;
use deck_proto::protocol::Command;
use tracing::{info, warn};

use crate::supervisor::Supervisor;

/// Renders semantic commands to wire lines and hands them to the supervisor.
///
/// A failed send means the action did not happen; the error is returned to
/// the caller and the bridge itself stays usable.
#[derive(Clone)]
pub struct CommandBridge {
    supervisor: Arc<Supervisor>,
}

impl CommandBridge {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    /// Send one command.  On success returns the line that was written,
    /// without its newline.
    pub async fn send(&self, cmd: &Command) -> Result<String, BridgeError> {
        let wire = cmd.to_wire()?;
        match self.supervisor.send_command(&wire).await {
            Ok(()) => Ok(wire.trim_end().to_string()),
            Err(e) => {
                warn!("Command {:?} not delivered: {}", cmd, e);
                Err(e)
            }
        }
    }

    /// Free-form text from the control surface.
    pub async fn send_text(&self, text: &str) -> Result<String, BridgeError> {
        let cmd = Command::parse(text)?;
        self.send(&cmd).await
    }

    /// Ask the backend to re-read the song list (after an upload).
    pub async fn reload(&self) -> Result<String, BridgeError> {
        info!("Requesting backend library reload");
        self.send(&Command::Reload).await
    }

    /// Ask the backend to forget a track (after its file was removed).
    pub async fn delete(&self, id: u32) -> Result<String, BridgeError> {
        info!("Requesting backend delete of track {}", id);
        self.send(&Command::Delete { id }).await
    }
}

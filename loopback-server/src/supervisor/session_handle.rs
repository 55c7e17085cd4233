use crate::session::{SessionCommand, SessionState};
use loopback_core::{SessionId, SignalingMessage};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Cheap, cloneable access to a running session: feed it commands and watch
/// its lifecycle.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        commands: mpsc::UnboundedSender<SessionCommand>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            id,
            commands,
            state,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Queues a command without waiting. Returns `false` once the session
    /// has finished.
    pub fn send(&self, cmd: SessionCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    /// Routes a decoded channel message to the session. Messages the server
    /// does not act on are skipped.
    pub fn dispatch(&self, msg: SignalingMessage) -> bool {
        match SessionCommand::from_message(msg) {
            Some(cmd) => self.send(cmd),
            None => {
                debug!("Session {}: ignoring message without a command", self.id);
                true
            }
        }
    }

    pub fn disconnect(&self) {
        let _ = self.commands.send(SessionCommand::Disconnect);
    }

    /// Waits until the session reaches a state matching `pred`, or ends.
    pub async fn wait_for(&self, pred: impl FnMut(&SessionState) -> bool) -> SessionState {
        let mut state = self.state.clone();
        if let Ok(s) = state.wait_for(pred).await {
            return *s;
        }
        let last = *state.borrow();
        last
    }

    pub async fn closed(&self) {
        self.wait_for(|s| s.is_closed()).await;
    }
}

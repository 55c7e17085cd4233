use crate::error::{NegotiationStage, SessionError};
use crate::session::{Negotiator, SessionConfig};
use crate::signaling::SignalingOutput;
use crate::supervisor::SessionHandle;
use crate::transport::TransportFactory;
use dashmap::DashMap;
use loopback_core::SessionId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Owns every live session. Each accepted channel gets exactly one session;
/// sessions share nothing but the immutable configuration.
#[derive(Clone)]
pub struct SessionSupervisor {
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
    transports: Arc<dyn TransportFactory>,
    config: SessionConfig,
}

impl SessionSupervisor {
    pub fn new(transports: Arc<dyn TransportFactory>, config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            transports,
            config,
        }
    }

    /// Allocates the transport, starts the session's negotiator and returns
    /// a handle to it. The session is forgotten once its negotiator ends.
    pub async fn spawn_session(
        &self,
        session_id: SessionId,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Result<SessionHandle, SessionError> {
        let (event_tx, event_rx) = mpsc::channel(self.config.event_queue);
        let transport = self
            .transports
            .create(session_id, event_tx)
            .await
            .map_err(|e| SessionError::negotiation(NegotiationStage::CreateTransport, format!("{e:#}")))?;

        // Unbounded so the channel reader never stalls while the negotiator waits
        // for gathering.
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let negotiator = Negotiator::new(
            session_id,
            self.config.clone(),
            transport,
            signaling,
            command_rx,
            event_rx,
        );

        let handle = SessionHandle::new(session_id, command_tx, negotiator.subscribe());
        self.sessions.insert(session_id, handle.clone());
        info!(
            "Session {} created ({} active)",
            session_id,
            self.sessions.len()
        );

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let session = negotiator.run().await;
            sessions.remove(&session.id());
            info!(
                "Session {} removed ({} active)",
                session.id(),
                sessions.len()
            );
        });

        Ok(handle)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Disconnects every live session and waits for each to close.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.state().is_closed())
            .collect();

        info!("Shutting down {} sessions", handles.len());
        for handle in &handles {
            handle.disconnect();
        }
        for handle in &handles {
            handle.closed().await;
        }
    }
}

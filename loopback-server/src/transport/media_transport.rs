use crate::relay::PacketSink;
use crate::transport::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use loopback_core::{IceCandidateInit, SessionDescription, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One transport session (peer connection) as the negotiator sees it.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn set_remote_description(&self, offer: &SessionDescription) -> Result<()>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Must be armed before `set_local_description`; yields once local
    /// gathering for that description is complete.
    async fn gathering_complete_promise(&self) -> mpsc::Receiver<()>;

    async fn set_local_description(&self, answer: &SessionDescription) -> Result<()>;

    /// Current local description, including every candidate gathered so far.
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn add_remote_candidate(&self, candidate: IceCandidateInit) -> Result<()>;

    /// The loopback track registered when the transport was created.
    fn loopback(&self) -> Arc<dyn PacketSink>;

    async fn close(&self) -> Result<()>;
}

/// Allocates a transport per session and wires its callbacks to `event_tx`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        session_id: SessionId,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn MediaTransport>>;
}

use async_trait::async_trait;
use loopback_core::SessionDescription;

/// The server's half of a session's signaling channel.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Send the completed local description to the peer.
    async fn send_answer(&self, answer: SessionDescription);

    /// Close the channel from the server side.
    async fn close(&self);

    /// Resolves once the peer can no longer receive anything on this channel.
    async fn closed(&self);
}

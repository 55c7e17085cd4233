use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use loopback_core::{SessionDescription, SessionId, SignalingMessage};
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Writes into the WebSocket writer task's queue, which preserves order.
pub struct ChannelOutput {
    session_id: SessionId,
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelOutput {
    pub fn new(session_id: SessionId, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { session_id, tx }
    }

    pub fn send_signal(&self, msg: SignalingMessage) {
        match msg.encode() {
            Ok(json) => {
                if let Err(e) = self.tx.send(Message::Text(json.into())) {
                    warn!(
                        "Session {}: channel gone, dropping outgoing message: {:?}",
                        self.session_id, e.0
                    );
                }
            }
            Err(e) => error!("Failed to serialize signaling message: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for ChannelOutput {
    async fn send_answer(&self, answer: SessionDescription) {
        self.send_signal(SignalingMessage::from(answer));
    }

    async fn close(&self) {
        let _ = self.tx.send(Message::Close(None));
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}

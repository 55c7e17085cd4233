use async_trait::async_trait;
use loopback_core::SessionDescription;
use loopback_server::SignalingOutput;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc, watch};

#[derive(Debug, Clone)]
pub enum SignalEvent {
    Answer(SessionDescription),
    Closed,
}

/// Mock SignalingOutput that captures everything the session sends and lets
/// the test hang up the channel.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<SignalEvent>,
    answers: Arc<Mutex<Vec<SessionDescription>>>,
    close_calls: Arc<AtomicUsize>,
    disconnected: Arc<watch::Sender<bool>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SignalEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (disconnected, _) = watch::channel(false);
        let signaling = Self {
            tx,
            answers: Arc::new(Mutex::new(Vec::new())),
            close_calls: Arc::new(AtomicUsize::new(0)),
            disconnected: Arc::new(disconnected),
        };
        (signaling, rx)
    }

    /// Simulates the peer going away.
    pub fn disconnect(&self) {
        self.disconnected.send_replace(true);
    }

    pub async fn answers(&self) -> Vec<SessionDescription> {
        self.answers.lock().await.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_answer(&self, answer: SessionDescription) {
        tracing::debug!("[MockSignaling] send_answer");
        self.answers.lock().await.push(answer.clone());
        let _ = self.tx.send(SignalEvent::Answer(answer));
    }

    async fn close(&self) {
        tracing::debug!("[MockSignaling] close");
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.disconnected.send_replace(true);
        let _ = self.tx.send(SignalEvent::Closed);
    }

    async fn closed(&self) {
        let mut rx = self.disconnected.subscribe();
        let _ = rx.wait_for(|gone| *gone).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signaling_captures_answer() {
        let (signaling, mut rx) = MockSignalingOutput::new();

        signaling.send_answer(SessionDescription::answer("v=0")).await;

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, SignalEvent::Answer(ref a) if a.sdp == "v=0"));
        assert_eq!(signaling.answers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_signaling_disconnect_resolves_closed() {
        let (signaling, _rx) = MockSignalingOutput::new();
        let waiter = tokio::spawn({
            let signaling = signaling.clone();
            async move { signaling.closed().await }
        });

        signaling.disconnect();
        waiter.await.unwrap();
        assert_eq!(signaling.close_calls(), 0);
    }
}

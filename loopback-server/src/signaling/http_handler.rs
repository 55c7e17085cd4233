use crate::error::SessionError;
use crate::session::SessionCommand;
use crate::signaling::SignalingOutput;
use crate::supervisor::SessionSupervisor;
use async_trait::async_trait;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loopback_core::{SessionDescription, SessionId, SignalingMessage};
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{error, info, warn};

/// Signaling output of a session negotiated over a single HTTP exchange:
/// the answer completes the pending request, nothing else is ever sent.
pub struct AnswerSlot {
    session_id: SessionId,
    tx: Mutex<Option<oneshot::Sender<SessionDescription>>>,
}

impl AnswerSlot {
    pub fn new(session_id: SessionId) -> (Self, oneshot::Receiver<SessionDescription>) {
        let (tx, rx) = oneshot::channel();
        let slot = Self {
            session_id,
            tx: Mutex::new(Some(tx)),
        };
        (slot, rx)
    }
}

#[async_trait]
impl SignalingOutput for AnswerSlot {
    async fn send_answer(&self, answer: SessionDescription) {
        let Some(tx) = self.tx.lock().await.take() else {
            warn!("Session {}: answer already delivered", self.session_id);
            return;
        };
        if tx.send(answer).is_err() {
            warn!("Session {}: HTTP client went away before the answer", self.session_id);
        }
    }

    async fn close(&self) {
        self.tx.lock().await.take();
    }

    async fn closed(&self) {
        let mut slot = self.tx.lock().await;
        if let Some(tx) = slot.as_mut() {
            tx.closed().await;
        }
    }
}

/// `POST /offer`: `{"type":"offer","sdp":...}` in, `{"type":"answer","sdp":...}`
/// out once local gathering is complete. No candidates are exchanged here.
pub async fn offer_handler(State(supervisor): State<SessionSupervisor>, body: String) -> Response {
    let sdp = match SignalingMessage::decode(&body) {
        Ok(SignalingMessage::Offer { sdp }) => sdp,
        Ok(_) => {
            return (StatusCode::BAD_REQUEST, "expected a message of type \"offer\"").into_response();
        }
        Err(e) => {
            let err = SessionError::from(e);
            warn!("Rejecting HTTP offer: {}", err);
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    let session_id = SessionId::new();
    let (slot, answer_rx) = AnswerSlot::new(session_id);

    let handle = match supervisor.spawn_session(session_id, Arc::new(slot)).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Session {}: could not be created: {:#}", session_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    info!("Session {}: negotiating over HTTP", session_id);

    if !handle.send(SessionCommand::Offer { sdp }) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match answer_rx.await {
        Ok(answer) => Json(SignalingMessage::from(answer)).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "negotiation failed").into_response(),
    }
}

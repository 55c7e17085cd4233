use crate::error::SessionError;
use crate::signaling::ChannelOutput;
use crate::supervisor::SessionSupervisor;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use loopback_core::{SessionId, SignalingMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(supervisor): State<SessionSupervisor>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, supervisor))
}

/// One signaling channel: one session for as long as the socket lives.
async fn handle_socket(socket: WebSocket, supervisor: SessionSupervisor) {
    let session_id = SessionId::new();
    info!("New signaling channel: {}", session_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let output = Arc::new(ChannelOutput::new(session_id, tx));
    let handle = match supervisor.spawn_session(session_id, output).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Session {}: could not be created: {:#}", session_id, e);
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sender.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let handle = handle.clone();

        async move {
            while let Some(frame) = receiver.next().await {
                let msg = match frame {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(
                            "Session {}: {}",
                            session_id,
                            SessionError::Channel(e.to_string())
                        );
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match SignalingMessage::decode(&text) {
                        Ok(signal) => {
                            debug!("Session {}: received {:?}", session_id, signal);
                            if !handle.dispatch(signal) {
                                break;
                            }
                        }
                        Err(e) => warn!(
                            "Session {}: dropping message: {}",
                            session_id,
                            SessionError::from(e)
                        ),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    handle.disconnect();
    info!("Signaling channel closed: {}", handle.id());
}

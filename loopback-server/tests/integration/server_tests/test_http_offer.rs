use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use loopback_core::{SessionDescription, SessionId, SignalingMessage};
use loopback_server::{
    SessionConfig, SessionSupervisor, TransportConfig, WebRtcTransportFactory, router,
};
use tower::ServiceExt;

use crate::integration::{OFFER_SDP, init_tracing};
use crate::utils::{
    CONNECTION_TIMEOUT_MS, MockBehavior, MockTransportFactory, SIGNAL_TIMEOUT_MS, TestClient,
    eventually,
};

fn post_offer(body: impl Into<Body>) -> Request<Body> {
    Request::post("/offer")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_offer_endpoint_rejects_bad_input() {
    init_tracing();

    let factory = MockTransportFactory::new(MockBehavior::default());
    let supervisor = SessionSupervisor::new(factory.clone(), SessionConfig::default());
    let app = router(supervisor.clone(), None);

    let response = app.clone().oneshot(post_offer("not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_offer(r#"{"type":"candidate","candidate":null}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(factory.created().await.is_empty());
    assert_eq!(supervisor.active_sessions(), 0);
}

#[tokio::test]
async fn test_offer_endpoint_answers_after_gathering() {
    init_tracing();

    let factory = MockTransportFactory::new(MockBehavior::default());
    let supervisor = SessionSupervisor::new(factory.clone(), SessionConfig::default());
    let app = router(supervisor.clone(), None);

    let offer = SignalingMessage::Offer {
        sdp: OFFER_SDP.into(),
    };
    let response = app
        .oneshot(post_offer(offer.encode().unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let SignalingMessage::Answer { sdp } = SignalingMessage::decode(&body_text(response).await).unwrap()
    else {
        panic!("Expected an answer");
    };
    assert_eq!(SessionDescription::answer(sdp).candidate_count(), 3);

    // The session outlives the request until its transport goes away
    assert_eq!(supervisor.active_sessions(), 1);
    let transport = factory.created().await.pop().expect("No transport created");
    transport.fail_connection().await;
    assert!(eventually(SIGNAL_TIMEOUT_MS, || async { supervisor.active_sessions() == 0 }).await);
}

#[tokio::test]
async fn test_health_and_static_files() {
    init_tracing();

    let dir = std::env::temp_dir().join(format!("loopback-static-{}", SessionId::new()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("hello.txt"), "hi").unwrap();

    let factory = MockTransportFactory::new(MockBehavior::default());
    let supervisor = SessionSupervisor::new(factory, SessionConfig::default());
    let app = router(supervisor, Some(dir.clone()));

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    let response = app
        .oneshot(Request::get("/hello.txt").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "hi");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_real_peer_gets_its_audio_back() {
    init_tracing();

    let transport = TransportConfig {
        ice_servers: vec![],
        ..Default::default()
    };
    let supervisor = SessionSupervisor::new(
        Arc::new(WebRtcTransportFactory::new(transport)),
        SessionConfig::default(),
    );
    let app = router(supervisor.clone(), None);

    let client = TestClient::new().await.expect("Failed to create test client");
    let offer = SignalingMessage::Offer {
        sdp: client.create_offer().await.expect("Failed to create offer"),
    };

    let response = app
        .oneshot(post_offer(offer.encode().unwrap()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let SignalingMessage::Answer { sdp } = SignalingMessage::decode(&body_text(response).await).unwrap()
    else {
        panic!("Expected an answer");
    };
    assert!(SessionDescription::answer(sdp.clone()).candidate_count() > 0);

    client.set_remote_answer(sdp).await.expect("Answer rejected");
    client
        .wait_connected(CONNECTION_TIMEOUT_MS)
        .await
        .expect("Client not connected");

    client.send_silence(50).await.expect("Failed to send audio");
    assert!(
        eventually(SIGNAL_TIMEOUT_MS, || async { client.echoed_packets() > 0 }).await,
        "No audio came back"
    );
    assert_eq!(client.echoed_track_ids().await, vec!["loopback-audio".to_owned()]);

    client.close().await.expect("Failed to close client");
    supervisor.shutdown().await;
    assert!(eventually(SIGNAL_TIMEOUT_MS, || async { supervisor.active_sessions() == 0 }).await);
}

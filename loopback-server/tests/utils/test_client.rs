use anyhow::{Context, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use loopback_server::AudioCodec;

/// A real browser-like offerer: sends one PCMU track and counts what comes
/// back on the server's loopback track.
pub struct TestClient {
    peer_connection: Arc<RTCPeerConnection>,
    track: Arc<TrackLocalStaticSample>,
    state: watch::Receiver<RTCPeerConnectionState>,
    echoed_packets: Arc<AtomicU64>,
    echoed_track_ids: Arc<tokio::sync::Mutex<Vec<String>>>,
}

impl TestClient {
    /// Create a client with no ICE servers (host candidates only).
    pub async fn new() -> Result<Self> {
        let codec = AudioCodec::pcmu();

        let mut media_engine = MediaEngine::default();
        media_engine.register_codec(codec.parameters(), RTPCodecType::Audio)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);

        let track = Arc::new(TrackLocalStaticSample::new(
            codec.capability(),
            "test-audio".to_owned(),
            "test-stream".to_owned(),
        ));
        let rtp_sender = peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtp_sender.read(&mut buf).await {}
        });

        let (state_tx, state) = watch::channel(RTCPeerConnectionState::New);
        peer_connection.on_peer_connection_state_change(Box::new(move |s| {
            tracing::debug!("[TestClient] Connection state: {:?}", s);
            state_tx.send_replace(s);
            Box::pin(async {})
        }));

        let echoed_packets = Arc::new(AtomicU64::new(0));
        let echoed_track_ids = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let packets = Arc::clone(&echoed_packets);
        let track_ids = Arc::clone(&echoed_track_ids);
        peer_connection.on_track(Box::new(move |remote, _receiver, _transceiver| {
            let packets = Arc::clone(&packets);
            let track_ids = Arc::clone(&track_ids);

            Box::pin(async move {
                tracing::debug!("[TestClient] Track received: {}", remote.id());
                track_ids.lock().await.push(remote.id());
                tokio::spawn(async move {
                    while remote.read_rtp().await.is_ok() {
                        packets.fetch_add(1, Ordering::Relaxed);
                    }
                });
            })
        }));

        Ok(Self {
            peer_connection,
            track,
            state,
            echoed_packets,
            echoed_track_ids,
        })
    }

    /// Create an offer and return its SDP once gathering has finished.
    pub async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        let mut gathered = self.peer_connection.gathering_complete_promise().await;
        self.peer_connection.set_local_description(offer).await?;
        let _ = gathered.recv().await;

        let local = self
            .peer_connection
            .local_description()
            .await
            .context("No local description")?;
        Ok(local.sdp)
    }

    pub async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(answer).await?;
        Ok(())
    }

    pub async fn wait_connected(&self, timeout_ms: u64) -> Result<()> {
        let mut state = self.state.clone();
        tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            state.wait_for(|s| *s == RTCPeerConnectionState::Connected),
        )
        .await
        .context("Timeout waiting for connection")?
        .context("State channel closed")?;
        Ok(())
    }

    /// Send `frames` 20 ms frames of mu-law silence.
    pub async fn send_silence(&self, frames: usize) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_millis(20));
        for _ in 0..frames {
            ticker.tick().await;
            self.track
                .write_sample(&Sample {
                    data: Bytes::from(vec![0xFFu8; 160]),
                    duration: Duration::from_millis(20),
                    ..Default::default()
                })
                .await?;
        }
        Ok(())
    }

    pub fn echoed_packets(&self) -> u64 {
        self.echoed_packets.load(Ordering::Relaxed)
    }

    pub async fn echoed_track_ids(&self) -> Vec<String> {
        self.echoed_track_ids.lock().await.clone()
    }

    pub async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

use crate::relay::{LoopbackTrack, PacketSink, PacketSource};
use crate::transport::{MediaTransport, TransportConfig, TransportEvent, TransportFactory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use loopback_core::{IceCandidateInit, SessionDescription, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_remote::TrackRemote;

/// A `webrtc` peer connection with one loopback audio track attached.
pub struct WebRtcTransport {
    session_id: SessionId,
    peer_connection: Arc<RTCPeerConnection>,
    loopback: Arc<LoopbackTrack>,
}

impl WebRtcTransport {
    /// Builds the peer connection, registers the loopback track and installs
    /// callbacks that forward everything into `event_tx`.
    pub async fn new(
        session_id: SessionId,
        config: &TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_codec(config.codec.parameters(), RTPCodecType::Audio)
            .context("Failed to register loopback codec")?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(
            api.new_peer_connection(config.rtc_configuration())
                .await
                .context("Failed to create peer connection")?,
        );

        let track = Arc::new(TrackLocalStaticRTP::new(
            config.codec.capability(),
            config.track_id.clone(),
            config.stream_id.clone(),
        ));
        let rtp_sender = peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .context("Failed to add loopback track")?;

        // Drain RTCP so the interceptors keep running; ends when the sender closes.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
        });

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Session {}: peer connection state {}", session_id, s);
                    let _ = tx.send(TransportEvent::ConnectionStateChanged(s)).await;
                })
            },
        ));

        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                Box::pin(async move {
                    info!("Session {}: ICE connection state {}", session_id, s);
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else {
                    let _ = tx.send(TransportEvent::GatheringComplete).await;
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx
                            .send(TransportEvent::CandidateGathered(init.into()))
                            .await;
                    }
                    Err(e) => warn!("Session {}: unserialisable local candidate: {}", session_id, e),
                }
            })
        }));

        let track_tx = event_tx;
        peer_connection.on_track(Box::new(move |remote, _receiver, _transceiver| {
            let tx = track_tx.clone();

            Box::pin(async move {
                info!(
                    "Session {}: remote track {} ({}, {})",
                    session_id,
                    remote.id(),
                    remote.kind(),
                    remote.codec().capability.mime_type
                );
                let _ = tx.send(TransportEvent::TrackBound(remote)).await;
            })
        }));

        Ok(Self {
            session_id,
            peer_connection,
            loopback: Arc::new(LoopbackTrack::new(track)),
        })
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn set_remote_description(&self, offer: &SessionDescription) -> Result<()> {
        let desc = RTCSessionDescription::try_from(offer).context("Malformed remote SDP")?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SessionDescription::try_from(answer)?)
    }

    async fn gathering_complete_promise(&self) -> mpsc::Receiver<()> {
        self.peer_connection.gathering_complete_promise().await
    }

    async fn set_local_description(&self, answer: &SessionDescription) -> Result<()> {
        let desc = RTCSessionDescription::try_from(answer)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.peer_connection.local_description().await?;
        SessionDescription::try_from(desc).ok()
    }

    async fn add_remote_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit::from(candidate))
            .await?;
        Ok(())
    }

    fn loopback(&self) -> Arc<dyn PacketSink> {
        self.loopback.clone()
    }

    async fn close(&self) -> Result<()> {
        debug!("Session {}: closing peer connection", self.session_id);
        self.peer_connection.close().await?;
        Ok(())
    }
}

#[async_trait]
impl PacketSource for TrackRemote {
    fn track_id(&self) -> String {
        self.id()
    }

    async fn read_packet(&self) -> Result<Packet> {
        let (packet, _attributes) = self.read_rtp().await?;
        Ok(packet)
    }
}

/// Creates a [`WebRtcTransport`] per session from one shared configuration.
pub struct WebRtcTransportFactory {
    config: TransportConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        session_id: SessionId,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn MediaTransport>> {
        let transport = WebRtcTransport::new(session_id, &self.config, event_tx).await?;
        Ok(Arc::new(transport))
    }
}

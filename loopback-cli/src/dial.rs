use crate::{Codec, IceArgs};
use anyhow::{Context, Result, bail};
use bytes::Bytes;
use colored::Colorize;
use loopback_core::{SessionDescription, SignalingMessage};
use loopback_server::{AudioCodec, TransportConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const FRAME: Duration = Duration::from_millis(20);

#[derive(clap::Args)]
pub struct DialArgs {
    /// Offer endpoint of a running loopback server.
    #[arg(long, default_value = "http://127.0.0.1:3000/offer")]
    url: String,

    /// Number of 20 ms audio frames to send.
    #[arg(long, default_value_t = 250)]
    frames: u32,

    /// Seconds to wait for the connection to come up.
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,

    #[command(flatten)]
    ice: IceArgs,

    #[arg(long, value_enum, default_value_t = Codec::Pcmu)]
    codec: Codec,
}

#[derive(Default)]
struct EchoCounter {
    packets: AtomicU64,
    bytes: AtomicU64,
}

/// One 20 ms frame of silence in the given codec.
fn silence_frame(codec: &AudioCodec) -> Bytes {
    if codec.mime_type == MIME_TYPE_OPUS {
        Bytes::from_static(&[0xF8, 0xFF, 0xFE])
    } else {
        // mu-law encodes zero amplitude as 0xFF; one byte per sample
        let samples = (codec.clock_rate / 50) as usize;
        Bytes::from(vec![0xFFu8; samples])
    }
}

async fn new_offerer(codec: &AudioCodec, ice: &IceArgs) -> Result<Arc<RTCPeerConnection>> {
    let mut m = MediaEngine::default();
    m.register_codec(codec.parameters(), RTPCodecType::Audio)?;
    let registry = register_default_interceptors(Registry::new(), &mut m)?;

    let api = APIBuilder::new()
        .with_media_engine(m)
        .with_interceptor_registry(registry)
        .build();

    let config = TransportConfig {
        ice_servers: ice.to_config(),
        codec: codec.clone(),
        ..Default::default()
    };
    let pc = api
        .new_peer_connection(config.rtc_configuration())
        .await
        .context("Failed to create peer connection")?;
    Ok(Arc::new(pc))
}

/// Negotiates with the server over a single HTTP exchange, streams silence
/// and reports how much of it came back.
pub async fn run(args: DialArgs) -> Result<()> {
    let codec = AudioCodec::from(args.codec);
    let pc = new_offerer(&codec, &args.ice).await?;

    let track = Arc::new(TrackLocalStaticSample::new(
        codec.capability(),
        "dial-audio".to_owned(),
        "dial-stream".to_owned(),
    ));
    let rtp_sender = pc
        .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; 1500];
        while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
    });

    let echoes = Arc::new(EchoCounter::default());
    let counter = Arc::clone(&echoes);
    pc.on_track(Box::new(move |remote, _receiver, _transceiver| {
        let counter = Arc::clone(&counter);

        Box::pin(async move {
            info!("Echo track {} bound", remote.id());
            tokio::spawn(async move {
                while let Ok((packet, _)) = remote.read_rtp().await {
                    counter.packets.fetch_add(1, Ordering::Relaxed);
                    counter
                        .bytes
                        .fetch_add(packet.payload.len() as u64, Ordering::Relaxed);
                }
                debug!("Echo track closed");
            });
        })
    }));

    let (state_tx, mut state_rx) = watch::channel(RTCPeerConnectionState::New);
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        info!("Peer connection state {}", s);
        state_tx.send_replace(s);
        Box::pin(async {})
    }));

    let offer = pc.create_offer(None).await?;
    let mut gathered = pc.gathering_complete_promise().await;
    pc.set_local_description(offer).await?;
    let _ = gathered.recv().await;

    let local = pc
        .local_description()
        .await
        .context("No local description after gathering")?;
    let offer = SessionDescription::try_from(local)?;
    info!("Sending offer with {} candidates to {}", offer.candidate_count(), args.url);

    let response = reqwest::Client::new()
        .post(&args.url)
        .json(&SignalingMessage::from(offer))
        .send()
        .await
        .context("Offer request failed")?
        .error_for_status()?;

    let SignalingMessage::Answer { sdp } = response.json::<SignalingMessage>().await? else {
        bail!("Server did not reply with an answer");
    };
    pc.set_remote_description(RTCSessionDescription::answer(sdp)?)
        .await
        .context("Server answer rejected")?;

    let connected = tokio::time::timeout(
        Duration::from_secs(args.connect_timeout),
        state_rx.wait_for(|s| {
            matches!(
                s,
                RTCPeerConnectionState::Connected
                    | RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Closed
            )
        }),
    )
    .await
    .context("Timed out waiting for the connection")?
    .map(|s| *s == RTCPeerConnectionState::Connected)
    .unwrap_or(false);

    if !connected {
        pc.close().await?;
        bail!("Connection failed");
    }

    let frame = silence_frame(&codec);
    let mut ticker = tokio::time::interval(FRAME);
    let mut sent = 0u32;

    while sent < args.frames {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                track
                    .write_sample(&Sample {
                        data: frame.clone(),
                        duration: FRAME,
                        ..Default::default()
                    })
                    .await?;
                sent += 1;
            }
        }
    }

    // give the last echoes time to arrive
    tokio::time::sleep(Duration::from_millis(500)).await;
    pc.close().await?;

    let packets = echoes.packets.load(Ordering::Relaxed);
    let bytes = echoes.bytes.load(Ordering::Relaxed);
    let summary = format!("sent {} frames, received {} echoed packets ({} bytes)", sent, packets, bytes);
    if packets > 0 {
        println!("{} {}", "✓".green(), summary);
    } else {
        println!("{} {}", "✗".red(), summary.yellow());
    }

    Ok(())
}

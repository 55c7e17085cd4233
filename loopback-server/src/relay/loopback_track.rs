use crate::relay::PacketSink;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use webrtc::rtp::packet::Packet;
use webrtc::track::track_local::TrackLocalWriter;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

/// The session's outgoing audio track. Every relay loop of a session writes
/// here, so writes go through one lock to keep packets whole and in order.
pub struct LoopbackTrack {
    track: Arc<TrackLocalStaticRTP>,
    write_lock: Mutex<()>,
}

impl LoopbackTrack {
    pub fn new(track: Arc<TrackLocalStaticRTP>) -> Self {
        Self {
            track,
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl PacketSink for LoopbackTrack {
    async fn write_packet(&self, packet: &Packet) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.track.write_rtp(packet).await?;
        Ok(())
    }
}

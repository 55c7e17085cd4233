use anyhow::Result;
use async_trait::async_trait;
use webrtc::rtp::packet::Packet;

/// Remote-originated media: yields RTP packets until the track or its
/// transport goes away.
#[async_trait]
pub trait PacketSource: Send + Sync {
    fn track_id(&self) -> String;

    async fn read_packet(&self) -> Result<Packet>;
}

/// Local media sink the relay writes into.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn write_packet(&self, packet: &Packet) -> Result<()>;
}

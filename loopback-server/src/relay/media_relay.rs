use crate::error::{RelayOp, SessionError};
use crate::relay::{PacketSink, PacketSource};
use loopback_core::SessionId;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Summary of a finished relay loop.
#[derive(Debug)]
pub struct RelayReport {
    pub track_id: String,
    pub packets: u64,
    pub bytes: u64,
    pub error: SessionError,
}

/// Forwards every packet read from one incoming track, unmodified, to the
/// session's loopback sink.
pub struct MediaRelay {
    session_id: SessionId,
    source: Arc<dyn PacketSource>,
    sink: Arc<dyn PacketSink>,
}

impl MediaRelay {
    pub fn new(
        session_id: SessionId,
        source: Arc<dyn PacketSource>,
        sink: Arc<dyn PacketSink>,
    ) -> Self {
        Self {
            session_id,
            source,
            sink,
        }
    }

    /// Runs until a read or write fails. Failures are reported, never retried.
    pub async fn run(self) -> RelayReport {
        let track_id = self.source.track_id();
        info!(
            "Session {}: relaying track {} to loopback",
            self.session_id, track_id
        );

        let mut packets = 0u64;
        let mut bytes = 0u64;

        let error = loop {
            let packet = match self.source.read_packet().await {
                Ok(packet) => packet,
                Err(e) => {
                    break SessionError::RelayIo {
                        op: RelayOp::Read,
                        track_id: track_id.clone(),
                        reason: format!("{e:#}"),
                    };
                }
            };

            trace!(
                "Session {}: packet seq={} payload={} bytes",
                self.session_id,
                packet.header.sequence_number,
                packet.payload.len()
            );

            if let Err(e) = self.sink.write_packet(&packet).await {
                break SessionError::RelayIo {
                    op: RelayOp::Write,
                    track_id: track_id.clone(),
                    reason: format!("{e:#}"),
                };
            }

            packets += 1;
            bytes += packet.payload.len() as u64;
        };

        debug!(
            "Session {}: relay for track {} finished after {} packets",
            self.session_id, track_id, packets
        );

        RelayReport {
            track_id,
            packets,
            bytes,
            error,
        }
    }
}

use crate::relay::PacketSource;
use loopback_core::IceCandidateInit;
use std::fmt;
use std::sync::Arc;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Events the transport engine reports from its callbacks. They are queued
/// and consumed by the session's control loop, never applied in place.
pub enum TransportEvent {
    /// A local candidate was discovered.
    CandidateGathered(IceCandidateInit),

    /// Local gathering finished for the current round.
    GatheringComplete,

    /// The remote peer started sending media on a new track.
    TrackBound(Arc<dyn PacketSource>),

    ConnectionStateChanged(RTCPeerConnectionState),
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::CandidateGathered(c) => {
                f.debug_tuple("CandidateGathered").field(c).finish()
            }
            TransportEvent::GatheringComplete => f.write_str("GatheringComplete"),
            TransportEvent::TrackBound(track) => {
                f.debug_tuple("TrackBound").field(&track.track_id()).finish()
            }
            TransportEvent::ConnectionStateChanged(s) => {
                f.debug_tuple("ConnectionStateChanged").field(s).finish()
            }
        }
    }
}

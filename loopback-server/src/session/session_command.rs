use loopback_core::{IceCandidateInit, SignalingMessage};

/// Commands a signaling channel delivers to its session's negotiator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// The peer sent an SDP offer.
    Offer { sdp: String },

    /// Remote candidate; `None` marks the end of the peer's candidates.
    Candidate { candidate: Option<IceCandidateInit> },

    /// The signaling channel is gone.
    Disconnect,
}

impl SessionCommand {
    /// Maps a decoded channel message to a command. Messages the server does
    /// not act on yield `None`.
    pub fn from_message(msg: SignalingMessage) -> Option<Self> {
        match msg {
            SignalingMessage::Offer { sdp } => Some(SessionCommand::Offer { sdp }),
            SignalingMessage::Candidate { candidate } => {
                Some(SessionCommand::Candidate { candidate })
            }
            SignalingMessage::Answer { .. } | SignalingMessage::Unknown => None,
        }
    }
}

use std::fmt;
use thiserror::Error;

/// Where in the offer/answer exchange a negotiation failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStage {
    CreateTransport,
    RemoteDescription,
    CreateAnswer,
    LocalDescription,
}

impl fmt::Display for NegotiationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            NegotiationStage::CreateTransport => "transport creation",
            NegotiationStage::RemoteDescription => "remote description",
            NegotiationStage::CreateAnswer => "answer creation",
            NegotiationStage::LocalDescription => "local description",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOp {
    Read,
    Write,
}

impl fmt::Display for RelayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayOp::Read => f.write_str("read"),
            RelayOp::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed or unrecognised signaling message. The message is dropped.
    #[error("undecodable signaling message: {0}")]
    ProtocolDecode(#[from] serde_json::Error),

    /// Fatal to the session.
    #[error("negotiation failed at {stage}: {reason}")]
    Negotiation {
        stage: NegotiationStage,
        reason: String,
    },

    /// Ends one relay loop only.
    #[error("relay {op} failed on track {track_id}: {reason}")]
    RelayIo {
        op: RelayOp,
        track_id: String,
        reason: String,
    },

    #[error("signaling channel failed: {0}")]
    Channel(String),
}

impl SessionError {
    pub fn negotiation(stage: NegotiationStage, err: impl fmt::Display) -> Self {
        SessionError::Negotiation {
            stage,
            reason: err.to_string(),
        }
    }
}

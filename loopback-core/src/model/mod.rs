mod convert;
mod session;
mod signaling;

pub use convert::ModelError;
pub use session::SessionId;
pub use signaling::{IceCandidateInit, IceServerConfig, SdpType, SessionDescription, SignalingMessage};

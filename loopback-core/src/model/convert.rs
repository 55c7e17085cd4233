use crate::model::signaling::{IceCandidateInit, IceServerConfig, SdpType, SessionDescription};
use thiserror::Error;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unsupported SDP type {0}")]
    UnsupportedSdpType(RTCSdpType),
}

impl From<IceCandidateInit> for RTCIceCandidateInit {
    fn from(c: IceCandidateInit) -> Self {
        Self {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_mline_index: c.sdp_mline_index,
            username_fragment: c.username_fragment,
        }
    }
}

impl From<RTCIceCandidateInit> for IceCandidateInit {
    fn from(c: RTCIceCandidateInit) -> Self {
        Self {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_mline_index: c.sdp_mline_index,
            username_fragment: c.username_fragment,
        }
    }
}

impl From<&IceServerConfig> for RTCIceServer {
    fn from(server: &IceServerConfig) -> Self {
        Self {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

impl TryFrom<&SessionDescription> for RTCSessionDescription {
    type Error = webrtc::Error;

    /// Parses the SDP body; a malformed body fails here rather than in the engine.
    fn try_from(desc: &SessionDescription) -> Result<Self, Self::Error> {
        match desc.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(desc.sdp.clone()),
            SdpType::Answer => RTCSessionDescription::answer(desc.sdp.clone()),
        }
    }
}

impl TryFrom<RTCSessionDescription> for SessionDescription {
    type Error = ModelError;

    fn try_from(desc: RTCSessionDescription) -> Result<Self, Self::Error> {
        let sdp_type = match desc.sdp_type {
            RTCSdpType::Offer => SdpType::Offer,
            RTCSdpType::Answer => SdpType::Answer,
            other => return Err(ModelError::UnsupportedSdpType(other)),
        };
        Ok(Self {
            sdp_type,
            sdp: desc.sdp,
        })
    }
}

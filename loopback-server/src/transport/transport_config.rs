use loopback_core::IceServerConfig;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_PCMU};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters};

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// The single audio codec registered with the media engine and used by the
/// loopback track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCodec {
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub payload_type: u8,
    pub sdp_fmtp_line: String,
}

impl AudioCodec {
    /// G.711 mu-law, 8 kHz mono, static payload type 0.
    pub fn pcmu() -> Self {
        Self {
            mime_type: MIME_TYPE_PCMU.to_owned(),
            clock_rate: 8000,
            channels: 1,
            payload_type: 0,
            sdp_fmtp_line: String::new(),
        }
    }

    pub fn opus() -> Self {
        Self {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            payload_type: 111,
            sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
        }
    }

    pub fn capability(&self) -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: self.mime_type.clone(),
            clock_rate: self.clock_rate,
            channels: self.channels,
            sdp_fmtp_line: self.sdp_fmtp_line.clone(),
            rtcp_feedback: vec![],
        }
    }

    pub fn parameters(&self) -> RTCRtpCodecParameters {
        RTCRtpCodecParameters {
            capability: self.capability(),
            payload_type: self.payload_type,
            ..Default::default()
        }
    }
}

impl Default for AudioCodec {
    fn default() -> Self {
        Self::pcmu()
    }
}

/// Immutable transport settings shared by every session of a server.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub codec: AudioCodec,
    pub track_id: String,
    pub stream_id: String,
}

impl TransportConfig {
    pub fn rtc_configuration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self.ice_servers.iter().map(RTCIceServer::from).collect(),
            ..Default::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_SERVER)],
            codec: AudioCodec::default(),
            track_id: "loopback-audio".to_owned(),
            stream_id: "loopback-stream".to_owned(),
        }
    }
}

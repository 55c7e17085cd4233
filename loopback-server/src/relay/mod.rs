mod loopback_track;
mod media_relay;
mod packet_io;

pub use loopback_track::*;
pub use media_relay::*;
pub use packet_io::*;

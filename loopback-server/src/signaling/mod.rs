mod channel_output;
mod http_handler;
mod signaling_output;
mod ws_handler;

pub use channel_output::*;
pub use http_handler::*;
pub use signaling_output::*;
pub use ws_handler::*;

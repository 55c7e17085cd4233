mod media_session;
mod negotiator;
mod session_command;
mod session_config;
mod session_state;

pub use media_session::*;
pub use negotiator::*;
pub use session_command::*;
pub use session_config::*;
pub use session_state::*;

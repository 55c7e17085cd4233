mod session_handle;
mod session_supervisor;

pub use session_handle::*;
pub use session_supervisor::*;

mod error;
mod relay;
mod server;
mod session;
mod signaling;
mod supervisor;
mod transport;

pub use error::*;
pub use relay::*;
pub use server::*;
pub use session::*;
pub use signaling::*;
pub use supervisor::*;
pub use transport::*;

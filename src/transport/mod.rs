pub mod tcp;
pub mod traits;

pub use tcp::TcpConnector;
pub use traits::{Listener, ACCEPT_BACKOFF, TransportConnector, TransportStream};

#[cfg(test)]
pub use traits::ScriptedListener;

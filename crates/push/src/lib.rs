pub mod http;
pub mod provider;

pub use provider::{MockTransport, PushError, PushMessage, PushTransport};

//! Error types shared across the inspector pipeline.

mod bridge;
mod protocol;
mod relay;

pub use bridge::BridgeError;
pub use protocol::ProtocolError;
pub use relay::RelayError;

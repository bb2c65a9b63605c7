//! # HotScope Relay
//!
//! The background router of the inspector pipeline. Each logical session
//! pairs exactly two independently-connecting endpoints (the inspector
//! UI and the page-injected bridge) and forwards messages between them
//! verbatim until either side disconnects.

mod relay;
pub mod server;

pub use relay::{
    BridgeInjector, EndpointHandle, EndpointSide, NoopInjector, Relay, SenderContext,
};
pub use server::{create_router, serve, RelayServerConfig};

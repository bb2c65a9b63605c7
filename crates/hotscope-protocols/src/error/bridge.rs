//! Bridge errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Relay connection failed: {0}")]
    ConnectFailed(String),

    #[error("Bridge already shut down")]
    Disconnected,

    #[error("Page bus closed")]
    PageBusClosed,
}

//! Protocol errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed endpoint name: {0}")]
    MalformedEndpointName(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

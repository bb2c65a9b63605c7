//! Relay errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Endpoint name not recognized: {0}")]
    UnknownEndpointName(String),

    #[error("Backend connection carries no session key")]
    MissingSessionKey,

    #[error("Session {0} already has a connected {1} endpoint")]
    EndpointOccupied(i64, &'static str),

    #[error("No active foreground session to substitute for the sentinel key")]
    NoActiveSession,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Endpoint disconnected")]
    Disconnected,
}

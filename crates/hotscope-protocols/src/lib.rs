//! # HotScope Protocols
//!
//! Shared protocol definitions for the HotScope inspector pipeline:
//!
//! - [`message`]: the wire messages exchanged between the inspector UI,
//!   the relay, the bridge, and the page-resident backend
//! - [`records`]: snapshot record types for tracked page elements
//!   (frames, controllers, cable streams, markers)
//! - [`session`]: session keys and endpoint naming
//! - [`sanitize`]: payload scrubbing for event details
//! - [`error`]: error types shared across the pipeline

pub mod error;
pub mod message;
pub mod records;
pub mod sanitize;
pub mod session;

pub use error::{BridgeError, ProtocolError, RelayError};
pub use message::{Message, PageMessage, PageSource};
pub use records::{
    CableRecord, ControllerRecord, ElementPath, EventEnvelope, FrameRecord, MarkerRecord,
    StreamEnvelope, TurboConfig, ValueBinding,
};
pub use sanitize::sanitize_payload;
pub use session::{encode_url, SessionKey, BACKEND_ENDPOINT_NAME, INSPECTOR_NAME_PREFIX};

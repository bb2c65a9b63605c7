//! Wire messages for the inspector pipeline.
//!
//! One internally-tagged enum covers every message crossing a channel
//! boundary: inspector requests flowing down to the backend, backend
//! reports flowing up to the inspector, the bridge handshake, and the
//! relay-sunk `LOG` diagnostics. The relay and bridge forward these
//! verbatim; only the backend and the inspector UI interpret them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{
    CableRecord, ControllerRecord, ElementPath, EventEnvelope, FrameRecord, MarkerRecord,
    StreamEnvelope, TurboConfig,
};

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

/// A message on the inspector pipeline.
///
/// Tag strings are the cross-context contract and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Message {
    // Handshake (bridge <-> backend).
    Init,
    Shutdown,

    // Liveness probe. Must be answered in Idle and Active alike.
    HealthCheck,
    HealthCheckResponse,

    // Inspector requests.
    RefreshAllState,
    RefreshTurboFrame {
        id: String,
    },
    HighlightElement {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_path: Option<ElementPath>,
    },
    HideHighlighting,
    ScrollAndHighlight {
        element_path: ElementPath,
    },
    UpdateDataAttribute {
        element_path: ElementPath,
        name: String,
        value: String,
    },
    ShowTurboFrameConnections {
        frame_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trigger_selector: Option<String>,
    },
    HideTurboFrameConnections,

    // Backend reports. Each carries a full snapshot, never a diff.
    SetTurboFrames {
        frames: Vec<FrameRecord>,
        url: String,
    },
    SetTurboCables {
        turbo_cables: Vec<CableRecord>,
        url: String,
    },
    SetStimulusData {
        stimulus_data: Vec<ControllerRecord>,
        url: String,
    },
    SetRegisteredStimulusIdentifiers {
        identifiers: Vec<String>,
        url: String,
    },
    SetTurboPermanentElements {
        turbo_permanent_elements: Vec<MarkerRecord>,
    },
    SetTurboTemporaryElements {
        turbo_temporary_elements: Vec<MarkerRecord>,
    },
    SetTurboConfig {
        turbo_config: TurboConfig,
        url: String,
    },
    TurboStreamReceived {
        turbo_stream: StreamEnvelope,
    },
    TurboEventReceived {
        turbo_event: EventEnvelope,
    },

    // Diagnostics. Sunk by the relay, never forwarded.
    Log {
        #[serde(default)]
        payload: Value,
    },
}

impl Message {
    /// Whether the relay should sink this message instead of forwarding it.
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Message::Log { .. })
    }

    /// Parse a message off a channel frame.
    pub fn from_json(text: &str) -> Result<Self, crate::error::ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode a message for a channel frame.
    pub fn to_json(&self) -> Result<String, crate::error::ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Origin marker for messages on the in-page broadcast bus.
///
/// The bridge only forwards messages stamped [`PageSource::Backend`] to the
/// relay, and stamps everything it injects into the page with
/// [`PageSource::Bridge`]; the backend mirrors that filter. The markers
/// keep each side from consuming its own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageSource {
    Backend,
    Bridge,
}

/// An envelope on the in-page broadcast bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    pub source: PageSource,
    pub message: Message,
}

impl PageMessage {
    pub fn from_backend(message: Message) -> Self {
        Self {
            source: PageSource::Backend,
            message,
        }
    }

    pub fn from_bridge(message: Message) -> Self {
        Self {
            source: PageSource::Bridge,
            message,
        }
    }
}

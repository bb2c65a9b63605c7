//! Snapshot record types for tracked page elements.
//!
//! Every report the backend emits carries full snapshots built from these
//! types, never diffs. Tree-shaped records (frames, controllers) recompute
//! their `children` lists on every report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;

/// Positional path from the document root to an element: the sibling index
/// at every level. Used to re-identify an element when a live selector is
/// ambiguous or unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementPath(pub Vec<usize>);

impl ElementPath {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ElementPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// A tracked `<turbo-frame>` element. Frames form a tree: `children` holds
/// the frames whose nearest frame ancestor is this one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    /// Stable identity token assigned on first observation.
    pub uid: String,
    /// The frame's `id` attribute (empty if absent).
    #[serde(default)]
    pub id: String,
    /// The frame's `src` attribute, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// The frame's `loading` attribute, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<String>,
    /// Attribute snapshot at report time.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Paths of elements that target this frame via `data-turbo-frame`.
    #[serde(default)]
    pub reference_elements: Vec<ElementPath>,
    /// Nested frames, recomputed on every report.
    #[serde(default)]
    pub children: Vec<FrameRecord>,
}

/// A named value binding on a controller (Stimulus value descriptor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueBinding {
    pub name: String,
    pub value: String,
}

/// One logical controller instance. An element hosting
/// `data-controller="a b"` yields two records sharing one `uid`,
/// distinguished by `identifier`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerRecord {
    pub uid: String,
    pub identifier: String,
    pub element_path: ElementPath,
    /// Target element descriptions discoverable for this identifier.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub values: Vec<ValueBinding>,
    #[serde(default)]
    pub outlets: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Controllers nested beneath this element, recomputed on every report.
    #[serde(default)]
    pub children: Vec<ControllerRecord>,
}

/// A tracked `<turbo-cable-stream-source>` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CableRecord {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_stream_name: Option<String>,
    /// Re-derived from attribute state on every attribute mutation.
    pub connected: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// An element carrying a survival marker (`data-turbo-permanent` or
/// `data-turbo-temporary`). An element carrying both appears in both
/// marker registries independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    pub uid: String,
    pub tag: String,
    #[serde(default)]
    pub id: String,
    pub element_path: ElementPath,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Page-level Turbo configuration, read from `<meta>` tags in `<head>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurboConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_scroll: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

/// Snapshot of a rendered Turbo stream element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEnvelope {
    pub uuid: String,
    pub time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<String>,
    /// The selector consumers should use to locate affected elements:
    /// the `targets` attribute when present, otherwise `#<target>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_selector: Option<String>,
    #[serde(default)]
    pub turbo_stream_content: String,
}

impl StreamEnvelope {
    /// Build an envelope from raw stream-element attributes, deriving
    /// `target_selector`.
    pub fn from_attributes(
        action: Option<&str>,
        target: Option<&str>,
        targets: Option<&str>,
        content: &str,
    ) -> Self {
        let target_selector = match (targets, target) {
            (Some(ts), _) => Some(ts.to_string()),
            (None, Some(t)) => Some(format!("#{t}")),
            (None, None) => None,
        };
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            time: chrono::Utc::now(),
            action: action.unwrap_or_default().to_string(),
            target: target.map(str::to_string),
            targets: targets.map(str::to_string),
            target_selector,
            turbo_stream_content: content.to_string(),
        }
    }
}

/// A forwarded page lifecycle event with sanitized details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub uuid: String,
    pub time: chrono::DateTime<chrono::Utc>,
    pub event_name: String,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_element_path: Option<ElementPath>,
}

impl EventEnvelope {
    pub fn new(
        event_name: impl Into<String>,
        details: serde_json::Value,
        target_element_path: Option<ElementPath>,
    ) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            time: chrono::Utc::now(),
            event_name: event_name.into(),
            details,
            target_element_path,
        }
    }
}

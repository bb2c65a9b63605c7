//! Session keys and endpoint naming.
//!
//! A session correlates one inspector connection with one inspected page
//! context. The inspector endpoint encodes its key in its connection name
//! (`hotscope-inspector-<key>`); the backend endpoint connects under a
//! fixed name and the relay derives its key from the sender context.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Name prefix for inspector-side endpoint connections.
pub const INSPECTOR_NAME_PREFIX: &str = "hotscope-inspector-";

/// Fixed connection name for the backend-side endpoint.
pub const BACKEND_ENDPOINT_NAME: &str = "hotscope-backend";

/// Identifier correlating one inspector connection with one inspected
/// page context (a tab id on browser platforms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub i64);

impl SessionKey {
    /// Sentinel value observed on one platform when the inspected context
    /// id is unavailable. The relay substitutes the active foreground
    /// session's key for it.
    pub const SENTINEL: SessionKey = SessionKey(-1);

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// The inspector endpoint name for this key.
    pub fn inspector_endpoint_name(&self) -> String {
        format!("{INSPECTOR_NAME_PREFIX}{}", self.0)
    }

    /// Parse a session key out of an inspector endpoint name.
    ///
    /// Returns `None` for names that do not carry the inspector prefix or
    /// a decimal key.
    pub fn from_inspector_name(name: &str) -> Option<SessionKey> {
        let raw = name.strip_prefix(INSPECTOR_NAME_PREFIX)?;
        raw.parse::<i64>().ok().map(SessionKey)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base64-encode a page URL for the `url` field carried by reports.
pub fn encode_url(url: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(url.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspector_name_round_trip() {
        let key = SessionKey(42);
        let name = key.inspector_endpoint_name();
        assert_eq!(name, "hotscope-inspector-42");
        assert_eq!(SessionKey::from_inspector_name(&name), Some(key));
    }

    #[test]
    fn sentinel_key_parses() {
        let parsed = SessionKey::from_inspector_name("hotscope-inspector--1").unwrap();
        assert!(parsed.is_sentinel());
    }

    #[test]
    fn malformed_inspector_names_rejected() {
        assert_eq!(SessionKey::from_inspector_name("hotscope-backend"), None);
        assert_eq!(SessionKey::from_inspector_name("hotscope-inspector-"), None);
        assert_eq!(
            SessionKey::from_inspector_name("hotscope-inspector-abc"),
            None
        );
    }

    #[test]
    fn encode_url_is_standard_base64() {
        assert_eq!(encode_url("http://localhost/"), "aHR0cDovL2xvY2FsaG9zdC8=");
    }
}

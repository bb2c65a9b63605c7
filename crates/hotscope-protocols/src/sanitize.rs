//! Payload scrubbing for event details.
//!
//! Event detail payloads originate in the inspected page and may contain
//! structures that cannot cross a channel boundary intact (cyclic object
//! graphs flattened to excessive depth, oversized blobs). Scrubbing
//! replaces the offending value in place with a sentinel string rather
//! than failing the whole report.

use serde_json::Value;

/// Placeholder substituted for values that cannot be carried verbatim.
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "[unserializable]";

/// Maximum nesting depth preserved in event details.
const MAX_DEPTH: usize = 16;

/// Maximum length preserved for a single string value.
const MAX_STRING_LEN: usize = 8 * 1024;

/// Scrub a payload in place so it is safe to forward. Never fails.
pub fn sanitize_payload(value: &mut Value) {
    sanitize_at(value, 0);
}

fn sanitize_at(value: &mut Value, depth: usize) {
    if depth >= MAX_DEPTH {
        *value = Value::String(UNSERIALIZABLE_PLACEHOLDER.to_string());
        return;
    }
    match value {
        Value::Object(map) => {
            for (_, nested) in map.iter_mut() {
                sanitize_at(nested, depth + 1);
            }
        }
        Value::Array(items) => {
            for nested in items.iter_mut() {
                sanitize_at(nested, depth + 1);
            }
        }
        Value::String(s) => {
            if s.len() > MAX_STRING_LEN {
                let mut cut = MAX_STRING_LEN;
                while !s.is_char_boundary(cut) {
                    cut -= 1;
                }
                s.truncate(cut);
                s.push('…');
            }
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}

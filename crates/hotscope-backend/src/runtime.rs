//! Controller runtime introspection.
//!
//! The inspected framework's live runtime may or may not be present in
//! the page. The backend queries it through this capability adapter and
//! degrades to empty collections when it is absent; a missing runtime is
//! never an error.

use hotscope_dom::{Document, NodeId};
use hotscope_protocols::records::ValueBinding;

/// Capability-queried view of the controller framework's runtime.
pub trait ControllerRuntime: Send + Sync {
    /// Identifiers registered with the framework application, in
    /// registration order.
    fn registered_identifiers(&self, doc: &Document) -> Vec<String>;

    /// Target names reachable for one controller instance.
    fn targets(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<String>;

    /// Declared value bindings for one controller instance.
    fn values(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<ValueBinding>;

    /// Declared outlet names for one controller instance.
    fn outlets(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<String>;

    /// Declared logical class names for one controller instance.
    fn classes(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<String>;
}

/// Null object for an absent runtime: every query returns empty.
pub struct NullRuntime;

impl ControllerRuntime for NullRuntime {
    fn registered_identifiers(&self, _doc: &Document) -> Vec<String> {
        Vec::new()
    }

    fn targets(&self, _doc: &Document, _node: NodeId, _identifier: &str) -> Vec<String> {
        Vec::new()
    }

    fn values(&self, _doc: &Document, _node: NodeId, _identifier: &str) -> Vec<ValueBinding> {
        Vec::new()
    }

    fn outlets(&self, _doc: &Document, _node: NodeId, _identifier: &str) -> Vec<String> {
        Vec::new()
    }

    fn classes(&self, _doc: &Document, _node: NodeId, _identifier: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Derives associations from the declarative `data-*` conventions:
/// `data-<identifier>-target`, `data-<identifier>-<name>-value`,
/// `data-<identifier>-<name>-class`, `data-<identifier>-<name>-outlet`.
pub struct DataAttributeRuntime;

impl DataAttributeRuntime {
    /// Middle segments of `data-<identifier>-<name><suffix>` attributes
    /// on the element itself.
    fn named_segments(
        doc: &Document,
        node: NodeId,
        identifier: &str,
        suffix: &str,
    ) -> Vec<String> {
        let prefix = format!("data-{identifier}-");
        doc.attributes(node)
            .keys()
            .filter_map(|name| {
                let middle = name.strip_prefix(&prefix)?.strip_suffix(suffix)?;
                (!middle.is_empty()).then(|| middle.to_string())
            })
            .collect()
    }
}

impl ControllerRuntime for DataAttributeRuntime {
    fn registered_identifiers(&self, doc: &Document) -> Vec<String> {
        let mut identifiers = Vec::new();
        for node in doc.subtree(doc.root()) {
            let Some(value) = doc.attribute(node, "data-controller") else {
                continue;
            };
            for token in value.split_whitespace() {
                if !identifiers.iter().any(|existing| existing == token) {
                    identifiers.push(token.to_string());
                }
            }
        }
        identifiers
    }

    fn targets(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<String> {
        let attribute = format!("data-{identifier}-target");
        let mut targets = Vec::new();
        for descendant in doc.subtree(node) {
            let Some(value) = doc.attribute(descendant, &attribute) else {
                continue;
            };
            for token in value.split_whitespace() {
                if !targets.iter().any(|existing| existing == token) {
                    targets.push(token.to_string());
                }
            }
        }
        targets
    }

    fn values(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<ValueBinding> {
        let prefix = format!("data-{identifier}-");
        doc.attributes(node)
            .iter()
            .filter_map(|(name, value)| {
                let middle = name.strip_prefix(&prefix)?.strip_suffix("-value")?;
                (!middle.is_empty()).then(|| ValueBinding {
                    name: middle.to_string(),
                    value: value.clone(),
                })
            })
            .collect()
    }

    fn outlets(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<String> {
        Self::named_segments(doc, node, identifier, "-outlet")
    }

    fn classes(&self, doc: &Document, node: NodeId, identifier: &str) -> Vec<String> {
        Self::named_segments(doc, node, identifier, "-class")
    }
}

//! Stimulus controller tracking.

use std::collections::HashMap;

use hotscope_dom::{Document, NodeId};
use hotscope_protocols::records::{ControllerRecord, ElementPath};

use crate::element_observer::{ElementDelegate, ElementObserver};
use crate::runtime::ControllerRuntime;

const CONTROLLER_ATTRIBUTE: &str = "data-controller";

/// Tracks elements declaring controllers via `data-controller`. One
/// element may host several logical controller instances (one per
/// whitespace-separated identifier token); each is reported as its own
/// leaf sharing the element's identity.
pub struct ControllerObserver {
    observer: ElementObserver,
    state: ControllerState,
}

#[derive(Default)]
struct ControllerState {
    registry: HashMap<String, TrackedController>,
    dirty: bool,
}

struct TrackedController {
    node: NodeId,
    identifiers: Vec<String>,
}

fn parse_identifiers(value: &str) -> Vec<String> {
    let mut identifiers = Vec::new();
    for token in value.split_whitespace() {
        if !identifiers.iter().any(|existing| existing == token) {
            identifiers.push(token.to_string());
        }
    }
    identifiers
}

impl ElementDelegate for ControllerState {
    fn match_element(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_attribute(node, CONTROLLER_ATTRIBUTE)
    }

    fn element_matched(&mut self, doc: &mut Document, node: NodeId) {
        let Some(uid) = doc.ensure_uid(node) else {
            return;
        };
        let identifiers =
            parse_identifiers(doc.attribute(node, CONTROLLER_ATTRIBUTE).unwrap_or(""));
        self.registry
            .insert(uid, TrackedController { node, identifiers });
        self.dirty = true;
    }

    fn element_unmatched(&mut self, doc: &Document, node: NodeId) {
        match doc.uid(node) {
            Some(uid) => {
                self.registry.remove(&uid);
            }
            None => self.registry.retain(|_, entry| entry.node != node),
        }
        self.dirty = true;
    }

    fn element_attribute_changed(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        name: &str,
        _old_value: Option<&str>,
    ) {
        let Some(uid) = doc.uid(node) else {
            return;
        };
        let Some(entry) = self.registry.get_mut(&uid) else {
            return;
        };
        if name == CONTROLLER_ATTRIBUTE {
            entry.identifiers =
                parse_identifiers(doc.attribute(node, CONTROLLER_ATTRIBUTE).unwrap_or(""));
        }
        // Any attribute change can affect value/class/outlet bindings,
        // which are recomputed at report time.
        self.dirty = true;
    }
}

impl ControllerObserver {
    pub fn new() -> Self {
        Self {
            observer: ElementObserver::new(),
            state: ControllerState::default(),
        }
    }

    pub fn start(&mut self, doc: &mut Document) {
        self.observer.start(doc, &mut self.state);
    }

    pub fn stop(&mut self, doc: &mut Document) {
        self.observer.stop(doc, &mut self.state);
        self.state.registry.clear();
    }

    pub fn poll(&mut self, doc: &mut Document) {
        self.observer.poll(doc, &mut self.state);
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.state.dirty)
    }

    pub fn len(&self) -> usize {
        self.state.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.registry.is_empty()
    }

    /// Full snapshot: the controller tree in document order. Leaves of
    /// nested controller elements hang off the first leaf of the nearest
    /// tracked ancestor element.
    pub fn report(&self, doc: &Document, runtime: &dyn ControllerRuntime) -> Vec<ControllerRecord> {
        let ordered: Vec<NodeId> = doc
            .subtree(doc.root())
            .into_iter()
            .filter(|node| self.is_tracked(doc, *node))
            .collect();

        let mut groups: HashMap<NodeId, Vec<ControllerRecord>> = ordered
            .iter()
            .map(|node| (*node, self.build_group(doc, runtime, *node)))
            .collect();

        let mut roots = Vec::new();
        for node in ordered.iter().rev() {
            let Some(group) = groups.remove(node) else {
                continue;
            };
            let parent = doc.closest_ancestor(*node, |d, n| self.is_tracked(d, n));
            let destination = match parent.and_then(|p| groups.get_mut(&p)) {
                Some(parent_group) if !parent_group.is_empty() => {
                    &mut parent_group[0].children
                }
                _ => &mut roots,
            };
            for record in group.into_iter().rev() {
                destination.insert(0, record);
            }
        }
        roots
    }

    fn is_tracked(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_attribute(node, CONTROLLER_ATTRIBUTE)
            && doc
                .uid(node)
                .is_some_and(|uid| self.state.registry.contains_key(&uid))
    }

    fn build_group(
        &self,
        doc: &Document,
        runtime: &dyn ControllerRuntime,
        node: NodeId,
    ) -> Vec<ControllerRecord> {
        let Some(uid) = doc.uid(node) else {
            return Vec::new();
        };
        let Some(entry) = self.state.registry.get(&uid) else {
            return Vec::new();
        };
        let element_path = ElementPath::new(doc.element_path(node).unwrap_or_default());
        entry
            .identifiers
            .iter()
            .map(|identifier| ControllerRecord {
                uid: uid.clone(),
                identifier: identifier.clone(),
                element_path: element_path.clone(),
                targets: runtime.targets(doc, node, identifier),
                values: runtime.values(doc, node, identifier),
                outlets: runtime.outlets(doc, node, identifier),
                classes: runtime.classes(doc, node, identifier),
                children: Vec::new(),
            })
            .collect()
    }
}

impl Default for ControllerObserver {
    fn default() -> Self {
        Self::new()
    }
}

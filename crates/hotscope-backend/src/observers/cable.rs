//! Turbo cable stream source tracking.

use std::collections::HashMap;

use hotscope_dom::{Document, NodeId};
use hotscope_protocols::records::CableRecord;

use crate::element_observer::{ElementDelegate, ElementObserver};

use super::{snapshot_attributes, TrackedElement};

const CABLE_TAG: &str = "turbo-cable-stream-source";
const CONNECTED_ATTRIBUTE: &str = "connected";

/// Tracks `<turbo-cable-stream-source>` elements. The `connected` flag
/// is re-derived from attribute state on every attribute mutation.
pub struct CableObserver {
    observer: ElementObserver,
    state: CableState,
}

#[derive(Default)]
struct CableState {
    registry: HashMap<String, TrackedElement>,
    dirty: bool,
}

impl ElementDelegate for CableState {
    fn match_element(&self, doc: &Document, node: NodeId) -> bool {
        doc.tag(node) == Some(CABLE_TAG)
    }

    fn element_matched(&mut self, doc: &mut Document, node: NodeId) {
        let Some(uid) = doc.ensure_uid(node) else {
            return;
        };
        self.registry
            .insert(uid.clone(), TrackedElement::capture(doc, node, uid));
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
        _name: &str,
        _old_value: Option<&str>,
    ) {
        if let Some(uid) = doc.uid(node) {
            if let Some(entry) = self.registry.get_mut(&uid) {
                entry.attributes = snapshot_attributes(doc, node);
                self.dirty = true;
            }
        }
    }
}

impl CableObserver {
    pub fn new() -> Self {
        Self {
            observer: ElementObserver::new(),
            state: CableState::default(),
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

    /// Full snapshot in document order.
    pub fn report(&self, doc: &Document) -> Vec<CableRecord> {
        doc.subtree(doc.root())
            .into_iter()
            .filter(|node| doc.tag(*node) == Some(CABLE_TAG))
            .filter_map(|node| {
                let uid = doc.uid(node)?;
                let entry = self.state.registry.get(&uid)?;
                Some(CableRecord {
                    uid: entry.uid.clone(),
                    channel: entry.attributes.get("channel").cloned(),
                    signed_stream_name: entry.attributes.get("signed-stream-name").cloned(),
                    connected: entry.attributes.contains_key(CONNECTED_ATTRIBUTE),
                    attributes: entry.attributes.clone(),
                })
            })
            .collect()
    }
}

impl Default for CableObserver {
    fn default() -> Self {
        Self::new()
    }
}

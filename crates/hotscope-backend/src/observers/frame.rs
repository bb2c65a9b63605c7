//! Turbo frame tracking.

use std::collections::HashMap;

use hotscope_dom::{Document, NodeId};
use hotscope_protocols::records::{ElementPath, FrameRecord};

use crate::element_observer::{ElementDelegate, ElementObserver};

use super::{snapshot_attributes, TrackedElement};

const FRAME_TAG: &str = "turbo-frame";

/// Tracks `<turbo-frame>` elements and reports them as a tree keyed by
/// DOM nesting.
pub struct FrameObserver {
    observer: ElementObserver,
    state: FrameState,
}

#[derive(Default)]
struct FrameState {
    registry: HashMap<String, TrackedElement>,
    dirty: bool,
}

impl ElementDelegate for FrameState {
    fn match_element(&self, doc: &Document, node: NodeId) -> bool {
        doc.tag(node) == Some(FRAME_TAG)
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

impl FrameObserver {
    pub fn new() -> Self {
        Self {
            observer: ElementObserver::new(),
            state: FrameState::default(),
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

    /// Whether state changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.state.dirty)
    }

    pub fn len(&self) -> usize {
        self.state.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.registry.is_empty()
    }

    /// Locate a tracked frame by its `id` attribute.
    pub fn find_by_frame_id(&self, doc: &Document, id: &str) -> Option<NodeId> {
        self.ordered_nodes(doc)
            .into_iter()
            .find(|node| doc.attribute(*node, "id") == Some(id))
    }

    /// Attached elements referencing `frame_id` via `data-turbo-frame`.
    pub fn reference_nodes(&self, doc: &Document, frame_id: &str) -> Vec<NodeId> {
        doc.find_by_attribute("data-turbo-frame", frame_id)
    }

    /// Full snapshot: the frame tree in document order. Frames whose DOM
    /// ancestor is not itself tracked become roots.
    pub fn report(&self, doc: &Document) -> Vec<FrameRecord> {
        let ordered = self.ordered_nodes(doc);
        let mut records: HashMap<NodeId, FrameRecord> = ordered
            .iter()
            .map(|node| (*node, self.build_record(doc, *node)))
            .collect();

        let mut roots = Vec::new();
        for node in ordered.iter().rev() {
            let Some(record) = records.remove(node) else {
                continue;
            };
            let parent = doc.closest_ancestor(*node, |d, n| self.is_tracked_frame(d, n));
            match parent.and_then(|p| records.get_mut(&p)) {
                Some(parent_record) => parent_record.children.insert(0, record),
                None => roots.insert(0, record),
            }
        }
        roots
    }

    fn ordered_nodes(&self, doc: &Document) -> Vec<NodeId> {
        doc.subtree(doc.root())
            .into_iter()
            .filter(|node| self.is_tracked_frame(doc, *node))
            .collect()
    }

    fn is_tracked_frame(&self, doc: &Document, node: NodeId) -> bool {
        doc.tag(node) == Some(FRAME_TAG)
            && doc
                .uid(node)
                .is_some_and(|uid| self.state.registry.contains_key(&uid))
    }

    fn build_record(&self, doc: &Document, node: NodeId) -> FrameRecord {
        let uid = doc.uid(node).unwrap_or_default();
        let id = doc.attribute(node, "id").unwrap_or_default().to_string();
        let reference_elements = if id.is_empty() {
            Vec::new()
        } else {
            self.reference_nodes(doc, &id)
                .into_iter()
                .filter_map(|reference| doc.element_path(reference))
                .map(ElementPath::new)
                .collect()
        };
        let attributes = self
            .state
            .registry
            .get(&uid)
            .map(|entry| entry.attributes.clone())
            .unwrap_or_else(|| snapshot_attributes(doc, node));
        FrameRecord {
            uid,
            id,
            src: doc.attribute(node, "src").map(str::to_string),
            loading: doc.attribute(node, "loading").map(str::to_string),
            attributes,
            reference_elements,
            children: Vec::new(),
        }
    }
}

impl Default for FrameObserver {
    fn default() -> Self {
        Self::new()
    }
}

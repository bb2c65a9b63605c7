//! Survival marker tracking (`data-turbo-permanent`,
//! `data-turbo-temporary`).
//!
//! One observer, two registries: an element carrying both markers is
//! tracked independently in each, and losing one marker attribute
//! removes it from that registry only.

use std::collections::HashMap;

use hotscope_dom::{Document, NodeId};
use hotscope_protocols::records::{ElementPath, MarkerRecord};

use crate::element_observer::{ElementDelegate, ElementObserver};

use super::{snapshot_attributes, TrackedElement};

const PERMANENT_ATTRIBUTE: &str = "data-turbo-permanent";
const TEMPORARY_ATTRIBUTE: &str = "data-turbo-temporary";

/// Which survival policy a registry tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Permanent,
    Temporary,
}

impl MarkerKind {
    fn attribute(&self) -> &'static str {
        match self {
            MarkerKind::Permanent => PERMANENT_ATTRIBUTE,
            MarkerKind::Temporary => TEMPORARY_ATTRIBUTE,
        }
    }
}

pub struct MarkerObserver {
    observer: ElementObserver,
    state: MarkerState,
}

#[derive(Default)]
struct MarkerState {
    permanent: HashMap<String, TrackedElement>,
    temporary: HashMap<String, TrackedElement>,
    permanent_dirty: bool,
    temporary_dirty: bool,
}

impl MarkerState {
    fn registry(&mut self, kind: MarkerKind) -> &mut HashMap<String, TrackedElement> {
        match kind {
            MarkerKind::Permanent => &mut self.permanent,
            MarkerKind::Temporary => &mut self.temporary,
        }
    }

    fn mark_dirty(&mut self, kind: MarkerKind) {
        match kind {
            MarkerKind::Permanent => self.permanent_dirty = true,
            MarkerKind::Temporary => self.temporary_dirty = true,
        }
    }

    /// Reconcile one registry with the element's current attribute state.
    fn reconcile(&mut self, doc: &Document, node: NodeId, uid: &str, kind: MarkerKind) {
        let carries = doc.has_attribute(node, kind.attribute());
        let registry = self.registry(kind);
        if carries {
            registry.insert(
                uid.to_string(),
                TrackedElement::capture(doc, node, uid.to_string()),
            );
            self.mark_dirty(kind);
        } else if registry.remove(uid).is_some() {
            self.mark_dirty(kind);
        }
    }
}

impl ElementDelegate for MarkerState {
    fn match_element(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_attribute(node, PERMANENT_ATTRIBUTE) || doc.has_attribute(node, TEMPORARY_ATTRIBUTE)
    }

    fn element_matched(&mut self, doc: &mut Document, node: NodeId) {
        let Some(uid) = doc.ensure_uid(node) else {
            return;
        };
        self.reconcile(doc, node, &uid, MarkerKind::Permanent);
        self.reconcile(doc, node, &uid, MarkerKind::Temporary);
    }

    fn element_unmatched(&mut self, doc: &Document, node: NodeId) {
        let uid = doc.uid(node);
        for kind in [MarkerKind::Permanent, MarkerKind::Temporary] {
            let removed = match &uid {
                Some(uid) => self.registry(kind).remove(uid).is_some(),
                None => {
                    let registry = self.registry(kind);
                    let before = registry.len();
                    registry.retain(|_, entry| entry.node != node);
                    registry.len() != before
                }
            };
            if removed {
                self.mark_dirty(kind);
            }
        }
    }

    fn element_attribute_changed(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        _name: &str,
        _old_value: Option<&str>,
    ) {
        let Some(uid) = doc.uid(node) else {
            return;
        };
        self.reconcile(doc, node, &uid, MarkerKind::Permanent);
        self.reconcile(doc, node, &uid, MarkerKind::Temporary);
    }
}

impl MarkerObserver {
    pub fn new() -> Self {
        Self {
            observer: ElementObserver::new(),
            state: MarkerState::default(),
        }
    }

    pub fn start(&mut self, doc: &mut Document) {
        self.observer.start(doc, &mut self.state);
    }

    pub fn stop(&mut self, doc: &mut Document) {
        self.observer.stop(doc, &mut self.state);
        self.state.permanent.clear();
        self.state.temporary.clear();
    }

    pub fn poll(&mut self, doc: &mut Document) {
        self.observer.poll(doc, &mut self.state);
    }

    pub fn take_dirty(&mut self, kind: MarkerKind) -> bool {
        match kind {
            MarkerKind::Permanent => std::mem::take(&mut self.state.permanent_dirty),
            MarkerKind::Temporary => std::mem::take(&mut self.state.temporary_dirty),
        }
    }

    pub fn len(&self, kind: MarkerKind) -> usize {
        match kind {
            MarkerKind::Permanent => self.state.permanent.len(),
            MarkerKind::Temporary => self.state.temporary.len(),
        }
    }

    /// Full snapshot for one registry, in document order.
    pub fn report(&self, doc: &Document, kind: MarkerKind) -> Vec<MarkerRecord> {
        let registry = match kind {
            MarkerKind::Permanent => &self.state.permanent,
            MarkerKind::Temporary => &self.state.temporary,
        };
        doc.subtree(doc.root())
            .into_iter()
            .filter_map(|node| {
                let uid = doc.uid(node)?;
                let entry = registry.get(&uid)?;
                Some(MarkerRecord {
                    uid: entry.uid.clone(),
                    tag: doc.tag(node).unwrap_or_default().to_string(),
                    id: doc.attribute(node, "id").unwrap_or_default().to_string(),
                    element_path: ElementPath::new(doc.element_path(node).unwrap_or_default()),
                    attributes: entry.attributes.clone(),
                })
            })
            .collect()
    }
}

impl Default for MarkerObserver {
    fn default() -> Self {
        Self::new()
    }
}

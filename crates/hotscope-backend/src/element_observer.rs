//! Generic incremental subtree watcher.
//!
//! [`ElementObserver`] maintains the set of elements a delegate's
//! predicate currently matches, feeding the delegate match/unmatch/
//! attribute transitions as the document mutates. One mutation batch is
//! processed to completion before the next; after every batch the
//! tracked set equals exactly the attached elements satisfying the
//! predicate.

use std::collections::HashSet;

use tracing::trace;

use hotscope_dom::{Document, Mutation, NodeId, WatcherId, UID_ATTRIBUTE};

/// Matching and transition callbacks for an [`ElementObserver`].
///
/// `match_element` must be a pure predicate over the element's tag and
/// attributes. The transition callbacks may read and write the document
/// (identity assignment happens there) but must never panic on detached
/// or vanished nodes.
pub trait ElementDelegate {
    fn match_element(&self, doc: &Document, node: NodeId) -> bool;

    fn element_matched(&mut self, doc: &mut Document, node: NodeId);

    fn element_unmatched(&mut self, doc: &Document, node: NodeId);

    /// An attribute changed on a tracked element that still matches.
    /// `old_value` is informational; delegates recompute from current
    /// document state.
    fn element_attribute_changed(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        name: &str,
        old_value: Option<&str>,
    );
}

/// Incremental watcher over a document subtree.
pub struct ElementObserver {
    watcher: Option<WatcherId>,
    tracked: HashSet<NodeId>,
}

impl ElementObserver {
    pub fn new() -> Self {
        Self {
            watcher: None,
            tracked: HashSet::new(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.watcher.is_some()
    }

    /// Number of currently tracked elements.
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.tracked.contains(&node)
    }

    /// Begin observing. Idempotent. Performs a full-tree scan and reports
    /// every currently matching element as newly matched.
    pub fn start(&mut self, doc: &mut Document, delegate: &mut dyn ElementDelegate) {
        if self.watcher.is_some() {
            return;
        }
        self.watcher = Some(doc.observe());
        for node in doc.subtree(doc.root()) {
            if delegate.match_element(doc, node) {
                self.tracked.insert(node);
                delegate.element_matched(doc, node);
            }
        }
        // Identity assignment during the scan lands in our own queue;
        // drain it so the first poll starts clean.
        self.poll(doc, delegate);
    }

    /// Cease observing. Flushes pending records first so no in-flight
    /// mutation is silently dropped. Idempotent.
    pub fn stop(&mut self, doc: &mut Document, delegate: &mut dyn ElementDelegate) {
        let Some(watcher) = self.watcher else {
            return;
        };
        let records = doc.take_records(watcher);
        self.process(doc, delegate, records);
        doc.unobserve(watcher);
        self.watcher = None;
        self.tracked.clear();
    }

    /// Drain and process this observer's pending mutation records as one
    /// batch.
    pub fn poll(&mut self, doc: &mut Document, delegate: &mut dyn ElementDelegate) {
        let Some(watcher) = self.watcher else {
            return;
        };
        let records = doc.take_records(watcher);
        if !records.is_empty() {
            self.process(doc, delegate, records);
        }
    }

    fn process(
        &mut self,
        doc: &mut Document,
        delegate: &mut dyn ElementDelegate,
        records: Vec<Mutation>,
    ) {
        for record in records {
            match record {
                Mutation::ChildList { added, removed, .. } => {
                    for root in removed {
                        self.remove_subtree(doc, delegate, root);
                    }
                    for root in added {
                        self.add_subtree(doc, delegate, root);
                    }
                }
                Mutation::Attribute {
                    target,
                    name,
                    old_value,
                } => {
                    if name == UID_ATTRIBUTE {
                        continue;
                    }
                    self.process_attribute(doc, delegate, target, &name, old_value.as_deref());
                }
            }
        }
    }

    fn remove_subtree(&mut self, doc: &Document, delegate: &mut dyn ElementDelegate, root: NodeId) {
        for node in doc.subtree(root) {
            if self.tracked.remove(&node) {
                trace!(?node, "element left the tracked set");
                delegate.element_unmatched(doc, node);
            }
        }
    }

    fn add_subtree(&mut self, doc: &mut Document, delegate: &mut dyn ElementDelegate, root: NodeId) {
        for node in doc.subtree(root) {
            if !self.tracked.contains(&node) && delegate.match_element(doc, node) {
                self.tracked.insert(node);
                trace!(?node, "element entered the tracked set");
                delegate.element_matched(doc, node);
            }
        }
    }

    fn process_attribute(
        &mut self,
        doc: &mut Document,
        delegate: &mut dyn ElementDelegate,
        target: NodeId,
        name: &str,
        old_value: Option<&str>,
    ) {
        let matches = doc.contains(target) && delegate.match_element(doc, target);
        if self.tracked.contains(&target) {
            if matches {
                delegate.element_attribute_changed(doc, target, name, old_value);
            } else {
                // The membership-defining attribute went away.
                self.tracked.remove(&target);
                delegate.element_unmatched(doc, target);
            }
        } else if matches && doc.is_attached(target) {
            // An attribute change can make an element start matching.
            self.tracked.insert(target);
            delegate.element_matched(doc, target);
        }
    }
}

impl Default for ElementObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "element_observer_tests.rs"]
mod tests;

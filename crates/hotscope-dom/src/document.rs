//! Element arena and mutation bookkeeping.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::error::DomError;
use crate::mutation::{Mutation, WatcherId};

/// Synthetic attribute carrying an element's identity token. Observers
/// suppress notifications for this attribute to avoid feedback loops
/// from identity assignment.
pub const UID_ATTRIBUTE: &str = "data-hotscope-uid";

/// Stable, copyable handle for an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: String,
}

/// An element tree with per-watcher mutation queues.
///
/// Removal detaches a subtree but keeps its nodes traversable, so a
/// watcher draining its queue after the fact can still visit every
/// descendant of a removed root. [`Document::gc_detached`] prunes
/// detached subtrees once every watcher has processed them.
#[derive(Debug)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    url: String,
    next_node: u64,
    next_uid: u64,
    next_watcher: u64,
    watchers: HashMap<WatcherId, Vec<Mutation>>,
}

impl Document {
    /// Create a document with a bare `html` root element.
    pub fn new(url: impl Into<String>) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                tag: "html".to_string(),
                attributes: BTreeMap::new(),
                parent: None,
                children: Vec::new(),
                text: String::new(),
            },
        );
        Self {
            nodes,
            root,
            url: url.into(),
            next_node: 1,
            next_uid: 1,
            next_watcher: 1,
            watchers: HashMap::new(),
        }
    }

    /// Create a document with the usual `html > head + body` skeleton.
    /// Returns the document plus the head and body ids.
    pub fn with_skeleton(url: impl Into<String>) -> (Self, NodeId, NodeId) {
        let mut doc = Self::new(url);
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        // The skeleton predates any watcher, so the records it produces
        // are drained immediately.
        let root = doc.root;
        let _ = doc.append_child(root, head);
        let _ = doc.append_child(root, body);
        for queue in doc.watchers.values_mut() {
            queue.clear();
        }
        (doc, head, body)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    // === Construction and structural mutation ===

    /// Create a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            Node {
                tag: tag.into().to_lowercase(),
                attributes: BTreeMap::new(),
                parent: None,
                children: Vec::new(),
                text: String::new(),
            },
        );
        id
    }

    /// Append `child` as the last child of `parent`, detaching it from
    /// any current parent first. Both moves are recorded.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) {
            return Err(DomError::UnknownNode);
        }
        if child == self.root {
            return Err(DomError::RootImmovable);
        }
        // Appending an ancestor (or self) under a descendant would cycle.
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(DomError::WouldCycle);
            }
            cursor = self.parent(node);
        }

        if let Some(old_parent) = self.parent(child) {
            self.detach(old_parent, child)?;
        }

        let node = self.nodes.get_mut(&child).ok_or(DomError::UnknownNode)?;
        node.parent = Some(parent);
        self.nodes
            .get_mut(&parent)
            .ok_or(DomError::UnknownNode)?
            .children
            .push(child);
        self.record(Mutation::ChildList {
            target: parent,
            added: vec![child],
            removed: vec![],
        });
        Ok(())
    }

    /// Remove `child` from `parent`. The subtree stays in the arena,
    /// detached, until [`Document::gc_detached`] is called.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.detach(parent, child)
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if child == self.root {
            return Err(DomError::RootImmovable);
        }
        let parent_node = self.nodes.get_mut(&parent).ok_or(DomError::UnknownNode)?;
        let position = parent_node
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or(DomError::NotAChild)?;
        parent_node.children.remove(position);
        self.nodes
            .get_mut(&child)
            .ok_or(DomError::UnknownNode)?
            .parent = None;
        self.record(Mutation::ChildList {
            target: parent,
            added: vec![],
            removed: vec![child],
        });
        Ok(())
    }

    /// Set an attribute, recording the previous value.
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let name = name.into();
        let value = value.into();
        let entry = self.nodes.get_mut(&node).ok_or(DomError::UnknownNode)?;
        let old_value = entry.attributes.insert(name.clone(), value);
        self.record(Mutation::Attribute {
            target: node,
            name,
            old_value,
        });
        Ok(())
    }

    /// Remove an attribute. Recording happens only if it was present.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        let entry = self.nodes.get_mut(&node).ok_or(DomError::UnknownNode)?;
        if let Some(old_value) = entry.attributes.remove(name) {
            self.record(Mutation::Attribute {
                target: node,
                name: name.to_string(),
                old_value: Some(old_value),
            });
        }
        Ok(())
    }

    /// Set text content. Text changes carry no mutation record; the
    /// observers only track structure and attributes.
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        self.nodes.get_mut(&node).ok_or(DomError::UnknownNode)?.text = text.into();
        Ok(())
    }

    /// Drop every node no longer reachable from the root. Watchers that
    /// have not drained their queues lose the ability to traverse the
    /// dropped subtrees, so callers run this only between batches.
    pub fn gc_detached(&mut self) {
        let mut reachable = HashSet::new();
        for id in self.subtree(self.root) {
            reachable.insert(id);
        }
        let before = self.nodes.len();
        self.nodes.retain(|id, _| reachable.contains(id));
        let dropped = before - self.nodes.len();
        if dropped > 0 {
            debug!(dropped, "Pruned detached nodes");
        }
    }

    // === Queries ===

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Whether the node is currently reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.tag.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(&node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Attribute snapshot in lexicographic order.
    pub fn attributes(&self, node: NodeId) -> BTreeMap<String, String> {
        self.nodes
            .get(&node)
            .map(|n| n.attributes.clone())
            .unwrap_or_default()
    }

    pub fn text(&self, node: NodeId) -> &str {
        self.nodes.get(&node).map(|n| n.text.as_str()).unwrap_or("")
    }

    /// Preorder traversal of `node` and its descendants. Works on
    /// detached subtrees too.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(&node) {
            return out;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Nearest self-or-ancestor satisfying the predicate. A broken or
    /// detached ancestry resolves to `None`, never an error.
    pub fn closest<F>(&self, node: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if predicate(self, current) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Nearest strict ancestor satisfying the predicate.
    pub fn closest_ancestor<F>(&self, node: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        self.parent(node)
            .and_then(|parent| self.closest(parent, predicate))
    }

    /// First attached element with the given `id` attribute.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .find(|node| self.attribute(*node, "id") == Some(id))
    }

    /// Attached elements whose `name` attribute equals `value`, in
    /// document order.
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .filter(|node| self.attribute(*node, name) == Some(value))
            .collect()
    }

    /// Content of `<meta name="...">` anywhere in the document.
    pub fn meta_content(&self, name: &str) -> Option<String> {
        self.subtree(self.root)
            .into_iter()
            .find(|node| {
                self.tag(*node) == Some("meta") && self.attribute(*node, "name") == Some(name)
            })
            .and_then(|node| self.attribute(node, "content").map(str::to_string))
    }

    /// Sibling-index path from the root to `node`; `None` when detached.
    pub fn element_path(&self, node: NodeId) -> Option<Vec<usize>> {
        if !self.is_attached(node) {
            return None;
        }
        let mut indices = Vec::new();
        let mut cursor = node;
        while let Some(parent) = self.parent(cursor) {
            let position = self.children(parent).iter().position(|c| *c == cursor)?;
            indices.push(position);
            cursor = parent;
        }
        indices.reverse();
        Some(indices)
    }

    /// Resolve a sibling-index path back to a node.
    pub fn resolve_path(&self, path: &[usize]) -> Option<NodeId> {
        let mut cursor = self.root;
        for index in path {
            cursor = *self.children(cursor).get(*index)?;
        }
        Some(cursor)
    }

    // === Identity ===

    /// Return the element's identity token, assigning one on first call.
    /// The assignment is recorded as a regular attribute mutation;
    /// observers suppress notifications for [`UID_ATTRIBUTE`].
    pub fn ensure_uid(&mut self, node: NodeId) -> Option<String> {
        if let Some(existing) = self.attribute(node, UID_ATTRIBUTE) {
            return Some(existing.to_string());
        }
        if !self.nodes.contains_key(&node) {
            return None;
        }
        let uid = format!("hs-{}", self.next_uid);
        self.next_uid += 1;
        // set_attribute cannot fail here, existence was checked above.
        let _ = self.set_attribute(node, UID_ATTRIBUTE, uid.clone());
        Some(uid)
    }

    pub fn uid(&self, node: NodeId) -> Option<String> {
        self.attribute(node, UID_ATTRIBUTE).map(str::to_string)
    }

    // === Watchers ===

    /// Register a mutation watcher. Every subsequent mutation is queued
    /// for it until [`Document::unobserve`].
    pub fn observe(&mut self) -> WatcherId {
        let id = WatcherId(self.next_watcher);
        self.next_watcher += 1;
        self.watchers.insert(id, Vec::new());
        id
    }

    /// Drain the pending records for a watcher.
    pub fn take_records(&mut self, watcher: WatcherId) -> Vec<Mutation> {
        self.watchers
            .get_mut(&watcher)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn unobserve(&mut self, watcher: WatcherId) {
        self.watchers.remove(&watcher);
    }

    fn record(&mut self, mutation: Mutation) {
        for queue in self.watchers.values_mut() {
            queue.push(mutation.clone());
        }
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;

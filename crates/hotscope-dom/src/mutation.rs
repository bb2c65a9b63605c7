//! Mutation records and watcher handles.

use crate::document::NodeId;

/// Handle for a registered mutation watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(pub(crate) u64);

/// One recorded document mutation.
///
/// Records mirror the platform's subtree observer: structural changes
/// name the parent plus the added/removed subtree roots, attribute
/// changes carry the previous value. Removed subtree roots remain
/// traversable (detached) until explicitly dropped, so a watcher
/// processing a batch can still visit every descendant of a removed
/// subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attribute {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

//! Entity observers: four specializations of the match/track/report
//! pattern, each owning a registry of tracked elements keyed by stable
//! identity.
//!
//! Every observer pairs an [`ElementObserver`](crate::ElementObserver)
//! with a delegate state struct holding the registry and a dirty flag the
//! aggregator drains after each poll. Reports are full snapshots built
//! from the live document; `children` lists are recomputed on every
//! report, never maintained incrementally.

mod cable;
mod controller;
mod frame;
mod marker;

pub use cable::CableObserver;
pub use controller::ControllerObserver;
pub use frame::FrameObserver;
pub use marker::{MarkerKind, MarkerObserver};

use std::collections::BTreeMap;

use hotscope_dom::{Document, NodeId, UID_ATTRIBUTE};

/// One registry entry: the identity token, a transient node handle used
/// for recomputation, and the patched attribute snapshot.
#[derive(Debug, Clone)]
pub(crate) struct TrackedElement {
    pub uid: String,
    pub node: NodeId,
    pub attributes: BTreeMap<String, String>,
}

impl TrackedElement {
    pub(crate) fn capture(doc: &Document, node: NodeId, uid: String) -> Self {
        Self {
            uid,
            node,
            attributes: snapshot_attributes(doc, node),
        }
    }
}

/// Attribute snapshot without the synthetic identity attribute.
pub(crate) fn snapshot_attributes(doc: &Document, node: NodeId) -> BTreeMap<String, String> {
    let mut attributes = doc.attributes(node);
    attributes.remove(UID_ATTRIBUTE);
    attributes
}

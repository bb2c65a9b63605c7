//! # HotScope DOM
//!
//! The document substrate the inspector backend observes: an element
//! arena with stable node ids, ordered attributes, and per-watcher
//! mutation queues mirroring the platform subtree-watch primitive.
//!
//! The model is deliberately lenient at its edges: lookups over detached
//! or unknown nodes resolve to "absent", never to a panic. Structural
//! operations that would corrupt the tree (cycles, unknown ids) return a
//! [`DomError`] instead.

mod document;
mod error;
mod mutation;

pub use document::{Document, NodeId, UID_ATTRIBUTE};
pub use error::DomError;
pub use mutation::{Mutation, WatcherId};

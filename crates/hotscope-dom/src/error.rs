//! Document errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("Unknown node id")]
    UnknownNode,

    #[error("Node is not a child of the given parent")]
    NotAChild,

    #[error("Insertion would create a cycle")]
    WouldCycle,

    #[error("The document root cannot be moved or removed")]
    RootImmovable,
}

//! Error types for the object store client.
//!
//! Store errors are deliberately coarse: the create pipeline only needs to
//! distinguish "the object is not there" (benign in several states) from
//! everything else, which it propagates unchanged.

use thiserror::Error;

/// Errors surfaced by an [`ObjectStore`](super::ObjectStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The named object does not exist
    #[error("object not found: {0}")]
    NotFound(String),

    /// An exclusive create hit an existing object, or a directory entry
    /// with the same name is already present
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// A pool with the given name does not exist
    #[error("pool does not exist: {0}")]
    NoSuchPool(String),

    /// The pool cannot switch to self-managed snapshot mode
    #[error("pool not configured for self-managed snapshots")]
    SnapshotModeUnsupported,

    /// Any other failure reported by the store backend
    #[error("store error: {0}")]
    Io(String),
}

impl StoreError {
    /// Creates a backend failure with the given message.
    pub fn io(message: impl Into<String>) -> Self {
        StoreError::Io(message.into())
    }

    /// Returns true if this error means the object simply is not there.
    ///
    /// The create pipeline treats this as benign when probing the directory
    /// object and the mirror registry.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

//! Error types for image creation.

use thiserror::Error;

use crate::store::StoreError;

/// Broad classification of a [`CreateError`].
///
/// Callers that do not care about the precise failure can branch on the
/// kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Feature bits outside the supported vocabulary were requested
    Unsupported,
    /// Inconsistent options: feature dependencies, striping, layout, or an
    /// unrecognized mirror mode
    Invalid,
    /// A numeric option is outside its allowed range
    DomainError,
    /// A named collaborator (the data pool) does not exist
    NotFound,
    /// A failure propagated from the store, the journal sub-service, or
    /// the watcher notifier
    Store,
}

/// Errors that can fail an image-create request.
///
/// Validator errors are produced before any cluster side effect; store
/// errors from the pipeline are reported after rollback has run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    /// Unknown feature bits were requested
    #[error("unsupported feature bits requested: {0:#x}")]
    UnsupportedFeatures(u64),

    /// A feature was requested without a feature it depends on
    #[error("incompatible features: {0}")]
    FeatureDependency(&'static str),

    /// Object size order outside the supported range
    #[error("order must be in the range [12, 25], got {0}")]
    OrderOutOfRange(u8),

    /// Exactly one of stripe unit and stripe count was specified
    #[error("must specify both (or neither) of stripe unit and stripe count")]
    UnpairedStriping,

    /// The stripe unit does not evenly divide the object size
    #[error("stripe unit {stripe_unit} is not a factor of the object size {object_size}")]
    InvalidStripeUnit { stripe_unit: u64, object_size: u64 },

    /// The named data pool does not exist
    #[error("data pool does not exist: {0}")]
    DataPoolMissing(String),

    /// The image would need more data objects than an object map can track
    #[error("image size {size} is not compatible with the object map")]
    ObjectMapTooLarge { size: u64 },

    /// The pool's mirror registry holds a mode this crate does not know
    #[error("unknown mirror mode on pool: {0}")]
    UnknownMirrorMode(u32),

    /// A store, journal, or notifier operation failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CreateError {
    /// Classifies this error into its broad [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            CreateError::UnsupportedFeatures(_) => ErrorKind::Unsupported,
            CreateError::FeatureDependency(_)
            | CreateError::UnpairedStriping
            | CreateError::InvalidStripeUnit { .. }
            | CreateError::ObjectMapTooLarge { .. }
            | CreateError::UnknownMirrorMode(_) => ErrorKind::Invalid,
            CreateError::OrderOutOfRange(_) => ErrorKind::DomainError,
            CreateError::DataPoolMissing(_) => ErrorKind::NotFound,
            CreateError::Store(_) => ErrorKind::Store,
        }
    }
}

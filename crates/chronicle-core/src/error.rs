//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::codec::CodecError;
use crate::store::{ExpectedRevision, StoreError};

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The aggregate's stream has no events.
    #[error("aggregate not found: {aggregate_type} {aggregate_id}")]
    AggregateNotFound {
        /// Logical name of the aggregate type.
        aggregate_type: &'static str,
        /// The requested identifier.
        aggregate_id: Uuid,
    },

    /// The aggregate has been logically deleted.
    #[error("aggregate deleted: {aggregate_type} {aggregate_id}")]
    AggregateDeleted {
        /// Logical name of the aggregate type.
        aggregate_type: &'static str,
        /// The aggregate identifier.
        aggregate_id: Uuid,
    },

    /// Optimistic concurrency conflict on save.
    #[error("version mismatch on stream {stream}: expected {expected}, actual revision {actual:?}")]
    VersionMismatch {
        /// The stream that was written to.
        stream: String,
        /// The revision the aggregate was loaded at.
        expected: ExpectedRevision,
        /// The stream's actual revision when the append was attempted.
        actual: Option<u64>,
    },

    /// A committed event could not be understood during replay.
    #[error("unknown event `{event_type}` at revision {revision} of stream {stream}")]
    UnknownEvent {
        /// The stream being replayed.
        stream: String,
        /// The unregistered type name.
        event_type: String,
        /// Position of the event within the stream.
        revision: u64,
    },

    /// The persisted prefix of a seeded stream differs from the desired one.
    #[error("seeded stream {stream} diverges from its desired events at index {index}")]
    SeedPrefixMismatch {
        /// The seeded stream.
        stream: String,
        /// First index whose digest differs.
        index: u64,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// Encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for the conflict callers are expected to retry after a
    /// reload.
    #[must_use]
    pub const fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::VersionMismatch { .. })
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RevisionMismatch {
                stream,
                expected,
                actual,
            } => Self::VersionMismatch {
                stream,
                expected,
                actual,
            },
            other => Self::Infrastructure(other.to_string()),
        }
    }
}

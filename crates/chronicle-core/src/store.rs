//! Event store contract.
//!
//! The core never talks to a concrete store; it consumes this trait. A store
//! is a set of named, append-only streams. Each stream has a 0-based revision
//! pointing at its last written event, or no revision at all if it has never
//! been written.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

/// The optimistic-concurrency token passed to every append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedRevision {
    /// The stream must not exist yet.
    NoStream,
    /// The stream's last event must be at exactly this revision.
    Exact(u64),
}

impl ExpectedRevision {
    /// Derives the expected revision from a last-known revision.
    #[must_use]
    pub const fn from_known(revision: Option<u64>) -> Self {
        match revision {
            None => Self::NoStream,
            Some(revision) => Self::Exact(revision),
        }
    }

    /// Returns `true` if a stream currently at `current` satisfies this
    /// expectation.
    #[must_use]
    pub const fn matches(self, current: Option<u64>) -> bool {
        match (self, current) {
            (Self::NoStream, None) => true,
            (Self::Exact(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }

    /// The revision this expectation points at, if any.
    #[must_use]
    pub const fn revision(self) -> Option<u64> {
        match self {
            Self::NoStream => None,
            Self::Exact(revision) => Some(revision),
        }
    }
}

impl fmt::Display for ExpectedRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStream => f.write_str("no stream"),
            Self::Exact(revision) => write!(f, "revision {revision}"),
        }
    }
}

/// One persisted unit as written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Globally unique event identifier.
    pub event_id: Uuid,
    /// Registered message type name of the payload.
    pub event_type: String,
    /// Encoded payload.
    pub payload: Vec<u8>,
    /// Encoded metadata, if any.
    pub metadata: Option<Vec<u8>>,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
}

/// An envelope read back from a stream, with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// The stream the event belongs to.
    pub stream_name: String,
    /// 0-based position within the stream.
    pub revision: u64,
    /// The persisted envelope.
    pub envelope: EventEnvelope,
}

/// Errors reported by an event store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The stream was not at the expected revision.
    #[error("stream {stream} expected at {expected}, actual revision {actual:?}")]
    RevisionMismatch {
        /// The stream that was written to.
        stream: String,
        /// The revision the writer expected.
        expected: ExpectedRevision,
        /// The stream's actual revision (`None` if it does not exist).
        actual: Option<u64>,
    },

    /// An append was attempted with no events.
    #[error("refusing to append an empty batch to stream {stream}")]
    EmptyBatch {
        /// The stream that was written to.
        stream: String,
    },

    /// Transport, storage or driver failure.
    #[error("event store backend error: {0}")]
    Backend(String),
}

/// Lazy, revision-ordered sequence of recorded events.
pub type EventStream<'a> = BoxStream<'a, Result<RecordedEvent, StoreError>>;

/// Append-only, revision-numbered event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Reads a stream from its first event in ascending revision order.
    ///
    /// A stream that does not exist yields an empty sequence.
    fn read_stream<'a>(&'a self, stream_name: &'a str) -> EventStream<'a>;

    /// Returns the revision of the stream's last event, or `None` if the
    /// stream has never been written.
    async fn latest_revision(&self, stream_name: &str) -> Result<Option<u64>, StoreError>;

    /// Atomically appends `events` if the stream is at `expected`, returning
    /// the new last revision. Either every event is written or none is.
    async fn append(
        &self,
        stream_name: &str,
        expected: ExpectedRevision,
        events: &[EventEnvelope],
    ) -> Result<u64, StoreError>;
}

//! Aggregate repository.
//!
//! Loads aggregates by replaying their whole stream and saves them by
//! appending their uncommitted events under the revision they were loaded
//! at. There is no in-process locking and no caching: the expected revision
//! passed to the store is the only concurrency control.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateRoot, EventSourced};
use crate::cancel::CancelSignal;
use crate::clock::Clock;
use crate::codec::{CodecError, DecodedEvent, EventCodec, MetadataResolver};
use crate::error::DomainError;
use crate::store::{EventEnvelope, EventStore, ExpectedRevision, RecordedEvent, StoreError};

/// Loads and saves aggregates against an [`EventStore`].
#[derive(Clone)]
pub struct AggregateRepository {
    store: Arc<dyn EventStore>,
    codec: EventCodec,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AggregateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRepository")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl AggregateRepository {
    /// Creates a repository.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, codec: EventCodec, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            codec,
            clock,
        }
    }

    /// The codec used to encode and decode events.
    #[must_use]
    pub const fn codec(&self) -> &EventCodec {
        &self.codec
    }

    /// Loads an aggregate by replaying every event of its stream in order.
    ///
    /// # Errors
    ///
    /// - `DomainError::AggregateNotFound` if the stream has no events.
    /// - `DomainError::UnknownEvent` if an event type is not registered.
    /// - `DomainError::Cancelled` if `cancel` fires mid-replay.
    /// - `DomainError::Codec` or `DomainError::Infrastructure` on decode or
    ///   store failures.
    #[instrument(skip(self, cancel), fields(aggregate = A::NAME))]
    pub async fn get_by_id<A: Aggregate>(
        &self,
        id: Uuid,
        cancel: &CancelSignal,
    ) -> Result<AggregateRoot<A>, DomainError> {
        let stream_name = AggregateRoot::<A>::stream_name_for(id);
        let mut root = AggregateRoot::<A>::new(id);
        let mut next_revision: u64 = 0;
        let mut events = self.store.read_stream(&stream_name);

        while let Some(recorded) = cancel.guard(events.next()).await? {
            let recorded = recorded?;
            check_order(&stream_name, next_revision, &recorded)?;
            let decoded = self.decode_committed(&stream_name, &recorded)?;
            root.replay(recorded.revision, &*decoded.message);
            next_revision = next_revision.saturating_add(1);
        }

        if root.revision().is_none() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: A::NAME,
                aggregate_id: id,
            });
        }
        root.finish_replay();
        debug!(stream = %stream_name, revision = ?root.revision(), "aggregate replayed");
        Ok(root)
    }

    /// Appends the aggregate's uncommitted events in a single call under the
    /// revision it was loaded at, then clears them and records the new tip.
    ///
    /// Saving with nothing pending is a no-op that returns the known
    /// revision. On any failure the aggregate is left untouched.
    ///
    /// # Errors
    ///
    /// - `DomainError::AggregateDeleted` if the stored state is deleted; no
    ///   store call is made.
    /// - `DomainError::VersionMismatch` if another writer moved the stream.
    /// - `DomainError::Cancelled` if `cancel` fires before the append
    ///   confirms.
    /// - `DomainError::Codec` or `DomainError::Infrastructure` on encode or
    ///   store failures.
    #[instrument(skip(self, root, cancel), fields(aggregate = A::NAME, id = %root.id()))]
    pub async fn save<A: Aggregate>(
        &self,
        root: &mut AggregateRoot<A>,
        cancel: &CancelSignal,
    ) -> Result<Option<u64>, DomainError> {
        if root.is_deleted_in_store() {
            return Err(DomainError::AggregateDeleted {
                aggregate_type: A::NAME,
                aggregate_id: root.id(),
            });
        }
        if root.uncommitted_events().is_empty() {
            return Ok(root.revision());
        }

        let stream_name = root.stream_name();
        let expected = ExpectedRevision::from_known(root.revision());
        let envelopes = self.encode(root)?;

        match cancel
            .guard(self.store.append(&stream_name, expected, &envelopes))
            .await?
        {
            Ok(revision) => {
                root.mark_committed(revision);
                debug!(stream = %stream_name, revision, count = envelopes.len(), "events appended");
                Ok(Some(revision))
            }
            Err(StoreError::RevisionMismatch { actual, .. }) => {
                warn!(stream = %stream_name, %expected, ?actual, "version mismatch on save");
                Err(DomainError::VersionMismatch {
                    stream: stream_name,
                    expected,
                    actual,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Reads a stream and decodes every event this process understands,
    /// skipping events whose type is not registered.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Codec` if a known event is malformed,
    /// `DomainError::Cancelled` if `cancel` fires, or
    /// `DomainError::Infrastructure` on store failures.
    #[instrument(skip(self, resolver, cancel))]
    pub async fn scan_stream(
        &self,
        stream_name: &str,
        resolver: Option<MetadataResolver<'_>>,
        cancel: &CancelSignal,
    ) -> Result<Vec<DecodedEvent>, DomainError> {
        let mut decoded = Vec::new();
        let mut events = self.store.read_stream(stream_name);

        while let Some(recorded) = cancel.guard(events.next()).await? {
            let recorded = recorded?;
            match self.codec.try_deserialize_envelope(&recorded, resolver)? {
                Some(event) => decoded.push(event),
                None => {
                    debug!(
                        revision = recorded.revision,
                        event_type = %recorded.envelope.event_type,
                        "skipping unregistered event"
                    );
                }
            }
        }
        Ok(decoded)
    }

    fn encode<A: Aggregate>(
        &self,
        root: &AggregateRoot<A>,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let now = self.clock.now();
        root.uncommitted_events()
            .iter()
            .map(|event| self.codec.encode_pending(event, now))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DomainError::from)
    }

    fn decode_committed(
        &self,
        stream_name: &str,
        recorded: &RecordedEvent,
    ) -> Result<DecodedEvent, DomainError> {
        self.codec
            .deserialize_envelope(recorded)
            .map_err(|err| match err {
                CodecError::UnknownEventKind(event_type) => DomainError::UnknownEvent {
                    stream: stream_name.to_owned(),
                    event_type,
                    revision: recorded.revision,
                },
                other => DomainError::Codec(other),
            })
    }
}

fn check_order(
    stream_name: &str,
    expected: u64,
    recorded: &RecordedEvent,
) -> Result<(), DomainError> {
    if recorded.revision == expected {
        Ok(())
    } else {
        Err(DomainError::Infrastructure(format!(
            "stream {stream_name} delivered revision {} where {expected} was expected",
            recorded.revision
        )))
    }
}

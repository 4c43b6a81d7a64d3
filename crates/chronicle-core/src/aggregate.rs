//! Aggregate root abstraction.
//!
//! An [`Aggregate`] is the pure state of a domain entity: a fold over its
//! events. [`AggregateRoot`] wraps that state with the bookkeeping the
//! repository needs: identity, last known stream revision, and the queue of
//! raised but not yet persisted events.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::DomainError;
use crate::message::{AnyMessage, Message};

/// State of an event-sourced entity.
pub trait Aggregate: Default + Send + Sync + 'static {
    /// Logical name, used to derive stream names as `"{NAME}-{id}"`.
    const NAME: &'static str;

    /// Folds one event into the state.
    ///
    /// Must be a pure function of the current state and the event. Event
    /// types this aggregate does not understand are ignored.
    fn apply(&mut self, event: &dyn AnyMessage);

    /// Whether the state is terminal (logically deleted).
    fn is_deleted(&self) -> bool {
        false
    }
}

/// An event raised in memory and waiting to be appended.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    /// Identifier the event will be persisted under.
    pub event_id: Uuid,
    /// The event payload.
    pub message: Arc<dyn AnyMessage>,
    /// Optional metadata written next to the payload.
    pub metadata: Option<Arc<dyn AnyMessage>>,
}

impl PendingEvent {
    /// Wraps a payload with a fresh event id and no metadata.
    #[must_use]
    pub fn new<M: Message>(message: M) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            message: Arc::new(message),
            metadata: None,
        }
    }

    /// Attaches metadata to the event.
    #[must_use]
    pub fn with_metadata<D: Message>(mut self, metadata: D) -> Self {
        self.metadata = Some(Arc::new(metadata));
        self
    }
}

/// Something with a stream name and a queue of events to publish.
///
/// Object-safe so seed sources can hand back aggregates of any type.
pub trait EventSourced: Send + Sync {
    /// Name of the stream the events belong to.
    fn stream_name(&self) -> String;

    /// Events raised but not yet persisted, in raise order.
    fn pending_events(&self) -> &[PendingEvent];
}

/// Identity, revision and uncommitted-event bookkeeping around an
/// [`Aggregate`].
#[derive(Debug)]
pub struct AggregateRoot<A: Aggregate> {
    id: Uuid,
    state: A,
    revision: Option<u64>,
    deleted_in_store: bool,
    uncommitted_events: Vec<PendingEvent>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates a fresh aggregate that has never been persisted.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: A::default(),
            revision: None,
            deleted_in_store: false,
            uncommitted_events: Vec::new(),
        }
    }

    /// Rebuilds an aggregate by folding an ordered history, as if it had
    /// been read from a stream starting at revision 0.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn replayed<'a, I>(id: Uuid, history: I) -> Self
    where
        I: IntoIterator<Item = &'a (dyn AnyMessage + 'static)>,
    {
        let mut root = Self::new(id);
        let mut revision = None;
        for event in history {
            let next = revision.map_or(0, |r: u64| r.saturating_add(1));
            root.replay(next, event);
            revision = Some(next);
        }
        root.finish_replay();
        root
    }

    /// Stream name for an aggregate of this type with the given id.
    #[must_use]
    pub fn stream_name_for(id: Uuid) -> String {
        format!("{}-{id}", A::NAME)
    }

    /// The aggregate identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current state, including raised but unsaved events.
    #[must_use]
    pub const fn state(&self) -> &A {
        &self.state
    }

    /// The last stream revision this instance knows about; `None` until the
    /// aggregate is loaded from or saved to a stream.
    #[must_use]
    pub const fn revision(&self) -> Option<u64> {
        self.revision
    }

    /// Whether the current state (including unsaved events) is deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state.is_deleted()
    }

    /// Whether the persisted state was already deleted when this instance
    /// last synchronised with its stream.
    #[must_use]
    pub const fn is_deleted_in_store(&self) -> bool {
        self.deleted_in_store
    }

    /// Events raised but not yet persisted.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[PendingEvent] {
        &self.uncommitted_events
    }

    /// Raises an event: folds it into the state and queues it for saving.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateDeleted` if the state is already
    /// deleted.
    pub fn raise<M: Message>(&mut self, event: M) -> Result<(), DomainError> {
        self.raise_pending(PendingEvent::new(event))
    }

    /// Raises an event carrying metadata.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateDeleted` if the state is already
    /// deleted.
    pub fn raise_with_metadata<M: Message, D: Message>(
        &mut self,
        event: M,
        metadata: D,
    ) -> Result<(), DomainError> {
        self.raise_pending(PendingEvent::new(event).with_metadata(metadata))
    }

    fn raise_pending(&mut self, pending: PendingEvent) -> Result<(), DomainError> {
        if self.state.is_deleted() {
            return Err(DomainError::AggregateDeleted {
                aggregate_type: A::NAME,
                aggregate_id: self.id,
            });
        }
        self.state.apply(&*pending.message);
        self.uncommitted_events.push(pending);
        Ok(())
    }

    pub(crate) fn replay(&mut self, revision: u64, event: &dyn AnyMessage) {
        self.state.apply(event);
        self.revision = Some(revision);
    }

    pub(crate) fn finish_replay(&mut self) {
        self.deleted_in_store = self.state.is_deleted();
    }

    pub(crate) fn mark_committed(&mut self, revision: u64) {
        self.uncommitted_events.clear();
        self.revision = Some(revision);
        self.deleted_in_store = self.state.is_deleted();
    }
}

impl<A: Aggregate> EventSourced for AggregateRoot<A> {
    fn stream_name(&self) -> String {
        Self::stream_name_for(self.id)
    }

    fn pending_events(&self) -> &[PendingEvent] {
        &self.uncommitted_events
    }
}

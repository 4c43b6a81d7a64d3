//! Test event stores: `EventStore` implementations backed by memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chronicle_core::store::{
    EventEnvelope, EventStore, EventStream, ExpectedRevision, RecordedEvent, StoreError,
};
use futures::StreamExt;
use futures::stream;

type Streams = HashMap<String, Vec<RecordedEvent>>;

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".into())
}

/// A fully working event store held in memory.
///
/// Clones share the same streams, so one clone can play the part of a
/// concurrent writer in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<Streams>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event in `stream_name`.
    #[must_use]
    pub fn events(&self, stream_name: &str) -> Vec<RecordedEvent> {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Names of every stream that holds at least one event, sorted.
    #[must_use]
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Appends an envelope without any revision check, returning its
    /// revision. Used to plant events written by other processes.
    pub fn push_raw(&self, stream_name: &str, envelope: EventEnvelope) -> u64 {
        let mut streams = self
            .streams
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let stream = streams.entry(stream_name.to_owned()).or_default();
        let revision = u64::try_from(stream.len()).unwrap_or(u64::MAX);
        stream.push(RecordedEvent {
            stream_name: stream_name.to_owned(),
            revision,
            envelope,
        });
        revision
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    fn read_stream<'a>(&'a self, stream_name: &'a str) -> EventStream<'a> {
        match self.streams.read() {
            Ok(streams) => {
                let events = streams.get(stream_name).cloned().unwrap_or_default();
                stream::iter(events.into_iter().map(Ok)).boxed()
            }
            Err(err) => stream::once(futures::future::ready(Err(poisoned(err)))).boxed(),
        }
    }

    async fn latest_revision(&self, stream_name: &str) -> Result<Option<u64>, StoreError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams
            .get(stream_name)
            .and_then(|events| events.last())
            .map(|event| event.revision))
    }

    async fn append(
        &self,
        stream_name: &str,
        expected: ExpectedRevision,
        events: &[EventEnvelope],
    ) -> Result<u64, StoreError> {
        if events.is_empty() {
            return Err(StoreError::EmptyBatch {
                stream: stream_name.to_owned(),
            });
        }

        let mut streams = self.streams.write().map_err(poisoned)?;
        let stream = streams.entry(stream_name.to_owned()).or_default();
        let current = stream.last().map(|event| event.revision);
        if !expected.matches(current) {
            return Err(StoreError::RevisionMismatch {
                stream: stream_name.to_owned(),
                expected,
                actual: current,
            });
        }

        let mut next = current.map_or(0, |revision| revision + 1);
        for envelope in events {
            stream.push(RecordedEvent {
                stream_name: stream_name.to_owned(),
                revision: next,
                envelope: envelope.clone(),
            });
            next += 1;
        }
        Ok(next - 1)
    }
}

/// One call made to [`RecordingEventStore::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendCall {
    /// Target stream.
    pub stream: String,
    /// Revision the caller expected.
    pub expected: ExpectedRevision,
    /// Event types in the batch, in order.
    pub event_types: Vec<String>,
}

/// An in-memory store that records every append attempt, successful or
/// not, and every stream read.
#[derive(Debug, Default)]
pub struct RecordingEventStore {
    inner: InMemoryEventStore,
    appends: Mutex<Vec<AppendCall>>,
    reads: Mutex<Vec<String>>,
}

impl RecordingEventStore {
    /// Wraps an existing in-memory store.
    #[must_use]
    pub fn new(inner: InMemoryEventStore) -> Self {
        Self {
            inner,
            appends: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryEventStore {
        &self.inner
    }

    /// Every append attempt so far.
    #[must_use]
    pub fn appends(&self) -> Vec<AppendCall> {
        self.appends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Streams passed to `read_stream`, in call order.
    #[must_use]
    pub fn reads(&self) -> Vec<String> {
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    fn read_stream<'a>(&'a self, stream_name: &'a str) -> EventStream<'a> {
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stream_name.to_owned());
        self.inner.read_stream(stream_name)
    }

    async fn latest_revision(&self, stream_name: &str) -> Result<Option<u64>, StoreError> {
        self.inner.latest_revision(stream_name).await
    }

    async fn append(
        &self,
        stream_name: &str,
        expected: ExpectedRevision,
        events: &[EventEnvelope],
    ) -> Result<u64, StoreError> {
        self.appends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AppendCall {
                stream: stream_name.to_owned(),
                expected,
                event_types: events.iter().map(|e| e.event_type.clone()).collect(),
            });
        self.inner.append(stream_name, expected, events).await
    }
}

/// An event store whose every operation fails with a backend error.
#[derive(Debug, Default)]
pub struct FailingEventStore;

fn connection_refused() -> StoreError {
    StoreError::Backend("connection refused".into())
}

#[async_trait]
impl EventStore for FailingEventStore {
    fn read_stream<'a>(&'a self, _stream_name: &'a str) -> EventStream<'a> {
        stream::once(futures::future::ready(Err(connection_refused()))).boxed()
    }

    async fn latest_revision(&self, _stream_name: &str) -> Result<Option<u64>, StoreError> {
        Err(connection_refused())
    }

    async fn append(
        &self,
        _stream_name: &str,
        _expected: ExpectedRevision,
        _events: &[EventEnvelope],
    ) -> Result<u64, StoreError> {
        Err(connection_refused())
    }
}

/// Reads pass through to an in-memory store; appends never complete.
///
/// Used to exercise cancellation of an in-flight append.
#[derive(Debug, Default)]
pub struct StallingEventStore {
    inner: InMemoryEventStore,
}

impl StallingEventStore {
    /// Wraps an existing in-memory store.
    #[must_use]
    pub const fn new(inner: InMemoryEventStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EventStore for StallingEventStore {
    fn read_stream<'a>(&'a self, stream_name: &'a str) -> EventStream<'a> {
        self.inner.read_stream(stream_name)
    }

    async fn latest_revision(&self, stream_name: &str) -> Result<Option<u64>, StoreError> {
        self.inner.latest_revision(stream_name).await
    }

    async fn append(
        &self,
        _stream_name: &str,
        _expected: ExpectedRevision,
        _events: &[EventEnvelope],
    ) -> Result<u64, StoreError> {
        futures::future::pending().await
    }
}

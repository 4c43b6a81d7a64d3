//! Shared test doubles for Chronicle: a fixed clock and in-memory event
//! stores.

mod clock;
mod store;

pub use clock::FixedClock;
pub use store::{
    AppendCall, FailingEventStore, InMemoryEventStore, RecordingEventStore, StallingEventStore,
};

//! Event seeder and seeding orchestrator behaviour.

mod common;

use std::sync::Arc;

use chronicle_core::aggregate::{AggregateRoot, EventSourced, PendingEvent};
use chronicle_core::cancel::CancelSignal;
use chronicle_core::error::DomainError;
use chronicle_core::seeding::{AggregateSeeder, SeedSource, SeedVerification};
use chronicle_core::store::ExpectedRevision;
use chronicle_test_support::{InMemoryEventStore, RecordingEventStore, StallingEventStore};
use common::{Counter, CounterOpened, Incremented, repository, seeder};
use uuid::Uuid;

fn increments(count: u32) -> Vec<PendingEvent> {
    (1..=count).map(|by| PendingEvent::new(Incremented { by })).collect()
}

#[tokio::test]
async fn test_seeding_empty_stream_publishes_everything() {
    // Arrange
    let store = Arc::new(RecordingEventStore::default());
    let seeder = seeder(store.clone());

    // Act
    let outcome = seeder
        .seed("Counter-seed", &increments(3), &CancelSignal::never())
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome.published, 3);
    assert_eq!(outcome.revision, Some(2));
    let appends = store.appends();
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].expected, ExpectedRevision::NoStream);
}

#[tokio::test]
async fn test_seeding_appends_only_the_missing_suffix() {
    // Arrange
    let store = Arc::new(RecordingEventStore::default());
    let seeder = seeder(store.clone());
    let desired = increments(7);
    seeder
        .seed("Counter-seed", &desired[..5], &CancelSignal::never())
        .await
        .unwrap();

    // Act
    let outcome = seeder
        .seed("Counter-seed", &desired, &CancelSignal::never())
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome.published, 2);
    assert_eq!(outcome.revision, Some(6));
    let appends = store.appends();
    assert_eq!(appends.len(), 2);
    assert_eq!(appends[1].expected, ExpectedRevision::Exact(4));
    assert_eq!(appends[1].event_types.len(), 2);
    let ids: Vec<Uuid> = store
        .inner()
        .events("Counter-seed")
        .iter()
        .map(|e| e.envelope.event_id)
        .collect();
    let desired_ids: Vec<Uuid> = desired.iter().map(|e| e.event_id).collect();
    assert_eq!(ids, desired_ids);
}

#[tokio::test]
async fn test_reseeding_is_a_no_op() {
    let store = Arc::new(RecordingEventStore::default());
    let seeder = seeder(store.clone());
    let desired = increments(2);
    seeder
        .seed("Counter-seed", &desired, &CancelSignal::never())
        .await
        .unwrap();

    let outcome = seeder
        .seed("Counter-seed", &desired, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.published, 0);
    assert_eq!(outcome.revision, Some(1));
    assert_eq!(store.appends().len(), 1);
}

#[tokio::test]
async fn test_growing_seed_converges_without_duplicates() {
    // Arrange
    let store = InMemoryEventStore::new();
    let seeder = seeder(Arc::new(store.clone()));
    let desired = increments(3);

    // Act
    seeder
        .seed("Counter-seed", &desired[..1], &CancelSignal::never())
        .await
        .unwrap();
    seeder
        .seed("Counter-seed", &desired, &CancelSignal::never())
        .await
        .unwrap();

    // Assert
    let events = store.events("Counter-seed");
    assert_eq!(events.len(), 3);
    let revisions: Vec<u64> = events.iter().map(|e| e.revision).collect();
    assert_eq!(revisions, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_stream_longer_than_seed_is_left_alone() {
    let store = Arc::new(RecordingEventStore::default());
    let seeder = seeder(store.clone());
    seeder
        .seed("Counter-seed", &increments(4), &CancelSignal::never())
        .await
        .unwrap();

    let outcome = seeder
        .seed("Counter-seed", &increments(2), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.published, 0);
    assert_eq!(outcome.revision, Some(3));
    assert_eq!(store.appends().len(), 1);
}

#[tokio::test]
async fn test_empty_seed_on_empty_stream_does_nothing() {
    let store = Arc::new(RecordingEventStore::default());
    let seeder = seeder(store.clone());

    let outcome = seeder
        .seed("Counter-seed", &[], &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.published, 0);
    assert_eq!(outcome.revision, None);
    assert!(store.appends().is_empty());
}

#[tokio::test]
async fn test_digest_verification_accepts_matching_prefix() {
    let store = InMemoryEventStore::new();
    let seeder = seeder(Arc::new(store.clone())).with_verification(SeedVerification::Digest);
    seeder
        .seed("Counter-seed", &increments(2), &CancelSignal::never())
        .await
        .unwrap();

    // Fresh event ids, same content.
    let outcome = seeder
        .seed("Counter-seed", &increments(3), &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.published, 1);
    assert_eq!(store.events("Counter-seed").len(), 3);
}

#[tokio::test]
async fn test_digest_verification_rejects_divergent_prefix() {
    // Arrange
    let store = InMemoryEventStore::new();
    let seeder = seeder(Arc::new(store.clone())).with_verification(SeedVerification::Digest);
    seeder
        .seed("Counter-seed", &increments(2), &CancelSignal::never())
        .await
        .unwrap();
    let changed = vec![
        PendingEvent::new(Incremented { by: 1 }),
        PendingEvent::new(Incremented { by: 99 }),
        PendingEvent::new(Incremented { by: 3 }),
    ];

    // Act
    let result = seeder
        .seed("Counter-seed", &changed, &CancelSignal::never())
        .await;

    // Assert
    match result {
        Err(DomainError::SeedPrefixMismatch { stream, index }) => {
            assert_eq!(stream, "Counter-seed");
            assert_eq!(index, 1);
        }
        other => panic!("expected SeedPrefixMismatch, got {other:?}"),
    }
    assert_eq!(store.events("Counter-seed").len(), 2);
}

#[tokio::test]
async fn test_trust_mode_ignores_divergent_prefix() {
    let store = InMemoryEventStore::new();
    let seeder = seeder(Arc::new(store.clone()));
    seeder
        .seed("Counter-seed", &increments(1), &CancelSignal::never())
        .await
        .unwrap();
    let changed = vec![
        PendingEvent::new(Incremented { by: 50 }),
        PendingEvent::new(Incremented { by: 2 }),
    ];

    let outcome = seeder
        .seed("Counter-seed", &changed, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.published, 1);
}

#[tokio::test]
async fn test_cancelled_seed_writes_nothing() {
    let inner = InMemoryEventStore::new();
    let seeder = seeder(Arc::new(StallingEventStore::new(inner.clone())));
    let (handle, cancel) = CancelSignal::pair();

    let seeds = increments(2);
    let (result, ()) = tokio::join!(seeder.seed("Counter-seed", &seeds, &cancel), async {
        tokio::task::yield_now().await;
        handle.cancel();
    });

    assert!(matches!(result, Err(DomainError::Cancelled)));
    assert!(inner.events("Counter-seed").is_empty());
}

struct CounterSeed {
    id: Uuid,
    label: &'static str,
    increments: Vec<u32>,
}

impl SeedSource for CounterSeed {
    fn name(&self) -> &str {
        self.label
    }

    fn build(&self) -> Result<Box<dyn EventSourced>, DomainError> {
        let mut root = AggregateRoot::<Counter>::new(self.id);
        root.raise(CounterOpened {
            label: self.label.to_owned(),
        })?;
        for by in &self.increments {
            root.raise(Incremented { by: *by })?;
        }
        Ok(Box::new(root))
    }
}

struct BrokenSeed;

impl SeedSource for BrokenSeed {
    fn name(&self) -> &str {
        "broken"
    }

    fn build(&self) -> Result<Box<dyn EventSourced>, DomainError> {
        Err(DomainError::Validation("seed data is incomplete".into()))
    }
}

#[tokio::test]
async fn test_orchestrator_seeds_sources_in_order() {
    // Arrange
    let store = Arc::new(RecordingEventStore::default());
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    let orchestrator = AggregateSeeder::new(seeder(store.clone()))
        .with_source(CounterSeed {
            id: first,
            label: "first",
            increments: vec![1],
        })
        .with_source(CounterSeed {
            id: second,
            label: "second",
            increments: vec![1, 2],
        });

    // Act
    let outcomes = orchestrator.run(&CancelSignal::never()).await.unwrap();

    // Assert
    let first_stream = AggregateRoot::<Counter>::stream_name_for(first);
    let second_stream = AggregateRoot::<Counter>::stream_name_for(second);
    let streams: Vec<String> = outcomes.iter().map(|o| o.stream.clone()).collect();
    assert_eq!(streams, vec![first_stream.clone(), second_stream.clone()]);
    let appended: Vec<String> = store.appends().into_iter().map(|a| a.stream).collect();
    assert_eq!(appended, vec![first_stream, second_stream]);

    let repo = repository(store);
    let loaded = repo
        .get_by_id::<Counter>(second, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(loaded.state().total, 3);
}

#[tokio::test]
async fn test_orchestrator_rerun_is_idempotent() {
    let store = Arc::new(RecordingEventStore::default());
    let orchestrator = AggregateSeeder::new(seeder(store.clone())).with_source(CounterSeed {
        id: Uuid::new_v4(),
        label: "only",
        increments: vec![5],
    });

    orchestrator.run(&CancelSignal::never()).await.unwrap();
    let second_run = orchestrator.run(&CancelSignal::never()).await.unwrap();

    assert_eq!(second_run[0].published, 0);
    assert_eq!(store.appends().len(), 1);
}

#[tokio::test]
async fn test_orchestrator_stops_at_first_failure() {
    // Arrange
    let store = Arc::new(RecordingEventStore::default());
    let (first, last) = (Uuid::new_v4(), Uuid::new_v4());
    let orchestrator = AggregateSeeder::new(seeder(store.clone()))
        .with_source(CounterSeed {
            id: first,
            label: "first",
            increments: vec![],
        })
        .with_source(BrokenSeed)
        .with_source(CounterSeed {
            id: last,
            label: "last",
            increments: vec![],
        });

    // Act
    let result = orchestrator.run(&CancelSignal::never()).await;

    // Assert
    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert_eq!(orchestrator.len(), 3);
    assert_eq!(
        store.inner().stream_names(),
        vec![AggregateRoot::<Counter>::stream_name_for(first)]
    );
}

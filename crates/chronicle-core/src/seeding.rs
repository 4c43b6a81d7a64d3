//! Idempotent stream seeding.
//!
//! A seed is a desired ordered list of events for a stream. The
//! [`EventSeeder`] treats the persisted stream as a prefix of that list and
//! appends only the missing suffix, so running the same seed repeatedly
//! converges on the desired list without duplicating events.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{error, info, instrument, warn};

use crate::aggregate::{EventSourced, PendingEvent};
use crate::cancel::CancelSignal;
use crate::clock::Clock;
use crate::codec::{CodecError, EventCodec};
use crate::error::DomainError;
use crate::store::{EventStore, ExpectedRevision};

/// How much the seeder trusts that the persisted prefix matches the seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeedVerification {
    /// Only stream length is compared.
    #[default]
    Trust,
    /// The persisted prefix is read back and compared event by event using
    /// a digest of the event type and the canonical JSON payload.
    Digest,
}

/// Result of seeding one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOutcome {
    /// The seeded stream.
    pub stream: String,
    /// Number of events appended by this run.
    pub published: usize,
    /// Stream revision after the run; `None` if the stream is still empty.
    pub revision: Option<u64>,
}

/// Publishes the missing suffix of a desired event list.
#[derive(Clone)]
pub struct EventSeeder {
    store: Arc<dyn EventStore>,
    codec: EventCodec,
    clock: Arc<dyn Clock>,
    verification: SeedVerification,
}

impl std::fmt::Debug for EventSeeder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSeeder")
            .field("verification", &self.verification)
            .finish_non_exhaustive()
    }
}

impl EventSeeder {
    /// Creates a seeder that trusts persisted prefixes.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, codec: EventCodec, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            codec,
            clock,
            verification: SeedVerification::Trust,
        }
    }

    /// Sets the prefix verification mode.
    #[must_use]
    pub const fn with_verification(mut self, verification: SeedVerification) -> Self {
        self.verification = verification;
        self
    }

    /// Appends `desired[n..]` to `stream_name`, where `n` is the number of
    /// events already persisted.
    ///
    /// The append is conditioned on the revision observed at the start, so
    /// a concurrent writer turns into a `VersionMismatch` rather than a
    /// duplicated suffix. A stream already longer than `desired` is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// - `DomainError::VersionMismatch` if the stream moved during seeding.
    /// - `DomainError::SeedPrefixMismatch` under
    ///   [`SeedVerification::Digest`] when the persisted prefix differs.
    /// - `DomainError::Cancelled` if `cancel` fires before the append
    ///   confirms.
    /// - `DomainError::Codec` or `DomainError::Infrastructure` on encode or
    ///   store failures.
    #[instrument(skip(self, desired, cancel), fields(desired = desired.len()))]
    pub async fn seed(
        &self,
        stream_name: &str,
        desired: &[PendingEvent],
        cancel: &CancelSignal,
    ) -> Result<SeedOutcome, DomainError> {
        let latest = cancel
            .guard(self.store.latest_revision(stream_name))
            .await??;
        let persisted = persisted_len(latest)?;

        if self.verification == SeedVerification::Digest && persisted > 0 {
            self.verify_prefix(stream_name, desired, persisted, cancel)
                .await?;
        }

        let unchanged = SeedOutcome {
            stream: stream_name.to_owned(),
            published: 0,
            revision: latest,
        };
        let Some(suffix) = desired.get(persisted..) else {
            warn!(persisted, "stream holds more events than its seed; leaving it as is");
            return Ok(unchanged);
        };
        if suffix.is_empty() {
            info!(persisted, "stream already seeded");
            return Ok(unchanged);
        }

        let now = self.clock.now();
        let envelopes = suffix
            .iter()
            .map(|event| self.codec.encode_pending(event, now))
            .collect::<Result<Vec<_>, _>>()?;
        let expected = ExpectedRevision::from_known(latest);
        let revision = cancel
            .guard(self.store.append(stream_name, expected, &envelopes))
            .await??;

        info!(published = envelopes.len(), revision, "seed events published");
        Ok(SeedOutcome {
            stream: stream_name.to_owned(),
            published: envelopes.len(),
            revision: Some(revision),
        })
    }

    async fn verify_prefix(
        &self,
        stream_name: &str,
        desired: &[PendingEvent],
        persisted: usize,
        cancel: &CancelSignal,
    ) -> Result<(), DomainError> {
        let overlap = persisted.min(desired.len());
        let mut events = self.store.read_stream(stream_name);

        for (index, wanted) in desired.iter().take(overlap).enumerate() {
            let Some(recorded) = cancel.guard(events.next()).await? else {
                break;
            };
            let recorded = recorded?;
            let wanted_payload = self.codec.serialize(&*wanted.message)?;
            let expected = digest(wanted.message.type_name(), &wanted_payload)?;
            let actual = digest(&recorded.envelope.event_type, &recorded.envelope.payload)?;
            if expected != actual {
                warn!(index, "persisted seed prefix diverges");
                return Err(DomainError::SeedPrefixMismatch {
                    stream: stream_name.to_owned(),
                    index: u64::try_from(index).unwrap_or(u64::MAX),
                });
            }
        }
        Ok(())
    }
}

fn persisted_len(latest: Option<u64>) -> Result<usize, DomainError> {
    match latest {
        None => Ok(0),
        Some(revision) => usize::try_from(revision)
            .ok()
            .and_then(|r| r.checked_add(1))
            .ok_or_else(|| {
                DomainError::Infrastructure(format!(
                    "stream revision {revision} exceeds the addressable range"
                ))
            }),
    }
}

/// Digest over the event type and the payload re-serialized with sorted
/// keys, so byte-level differences in key order do not count.
fn digest(event_type: &str, payload: &[u8]) -> Result<[u8; 32], CodecError> {
    let canonical = serde_json::to_vec(&serde_json::from_slice::<Value>(payload)?)?;
    let mut hasher = Sha256::new();
    hasher.update(event_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(&canonical);
    Ok(hasher.finalize().into())
}

/// Builds the aggregate whose raised events form one seed.
pub trait SeedSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Builds a fresh aggregate and raises its seed events on it.
    ///
    /// # Errors
    ///
    /// Returns a `DomainError` if the seed cannot be constructed.
    fn build(&self) -> Result<Box<dyn EventSourced>, DomainError>;
}

/// Runs a list of seed sources in order through one [`EventSeeder`].
pub struct AggregateSeeder {
    seeder: EventSeeder,
    sources: Vec<Box<dyn SeedSource>>,
}

impl std::fmt::Debug for AggregateSeeder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("AggregateSeeder")
            .field("seeder", &self.seeder)
            .field("sources", &names)
            .finish()
    }
}

impl AggregateSeeder {
    /// Creates an orchestrator with no sources.
    #[must_use]
    pub fn new(seeder: EventSeeder) -> Self {
        Self {
            seeder,
            sources: Vec::new(),
        }
    }

    /// Appends a source; sources run in the order they were added.
    #[must_use]
    pub fn with_source(mut self, source: impl SeedSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no sources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Seeds every source in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while building or seeding a source.
    /// Sources after the failing one are not attempted.
    #[instrument(skip_all, fields(sources = self.sources.len()))]
    pub async fn run(&self, cancel: &CancelSignal) -> Result<Vec<SeedOutcome>, DomainError> {
        let mut outcomes = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let aggregate = source.build().inspect_err(|err| {
                error!(source = source.name(), error = %err, "seed source failed to build");
            })?;
            let outcome = self
                .seeder
                .seed(&aggregate.stream_name(), aggregate.pending_events(), cancel)
                .await
                .inspect_err(|err| {
                    error!(source = source.name(), error = %err, "seeding failed");
                })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

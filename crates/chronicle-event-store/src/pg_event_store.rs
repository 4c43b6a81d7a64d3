//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use chronicle_core::store::{
    EventEnvelope, EventStore, EventStream, ExpectedRevision, RecordedEvent, StoreError,
};

const UNIQUE_VIOLATION: &str = "23505";
const STREAM_REVISION_KEY: &str = "stream_events_pkey";
const EVENT_ID_KEY: &str = "stream_events_event_id_key";

/// Which unique constraint an insert tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UniqueViolation {
    StreamRevision,
    EventId,
}

/// PostgreSQL-backed event store.
///
/// Appends to one stream are serialised with a transaction-scoped advisory
/// lock keyed on the stream name; the `(stream_name, revision)` primary key
/// backs that up if two writers ever slip past it. Reusing an event id is a
/// backend error, never a revision conflict.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_revision(
        tx: &mut Transaction<'_, Postgres>,
        stream_name: &str,
    ) -> Result<Option<u64>, StoreError> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(revision) FROM stream_events WHERE stream_name = $1")
                .bind(stream_name)
                .fetch_one(&mut **tx)
                .await
                .map_err(backend)?;
        max.map(from_db_revision).transpose()
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    fn read_stream<'a>(&'a self, stream_name: &'a str) -> EventStream<'a> {
        sqlx::query(
            r"
            SELECT stream_name, revision, event_id, event_type, payload, metadata, created_at
            FROM stream_events
            WHERE stream_name = $1
            ORDER BY revision ASC
            ",
        )
        .bind(stream_name)
        .fetch(&self.pool)
        .map(|row| row.map_err(backend).and_then(|row| recorded_from_row(&row)))
        .boxed()
    }

    #[instrument(skip(self))]
    async fn latest_revision(&self, stream_name: &str) -> Result<Option<u64>, StoreError> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(revision) FROM stream_events WHERE stream_name = $1")
                .bind(stream_name)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
        max.map(from_db_revision).transpose()
    }

    #[instrument(skip(self, events), fields(expected = %expected, count = events.len()))]
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

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(stream_name)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let current = Self::current_revision(&mut tx, stream_name).await?;
        if !expected.matches(current) {
            warn!(?current, "revision mismatch on append");
            return Err(StoreError::RevisionMismatch {
                stream: stream_name.to_owned(),
                expected,
                actual: current,
            });
        }

        let mut next = current.map_or(0, |revision| revision.saturating_add(1));
        for envelope in events {
            let result = sqlx::query(
                r"
                INSERT INTO stream_events
                    (stream_name, revision, event_id, event_type, payload, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(stream_name)
            .bind(to_db_revision(next)?)
            .bind(envelope.event_id)
            .bind(&envelope.event_type)
            .bind(&envelope.payload)
            .bind(envelope.metadata.as_deref())
            .bind(envelope.created_at)
            .execute(&mut *tx)
            .await;

            if let Err(err) = result {
                return Err(match unique_violation(&err) {
                    Some(UniqueViolation::StreamRevision) => {
                        warn!(revision = next, "concurrent append detected by constraint");
                        StoreError::RevisionMismatch {
                            stream: stream_name.to_owned(),
                            expected,
                            actual: Some(next),
                        }
                    }
                    Some(UniqueViolation::EventId) => {
                        warn!(event_id = %envelope.event_id, "event id already stored");
                        StoreError::Backend(format!(
                            "event id {} is already stored: {err}",
                            envelope.event_id
                        ))
                    }
                    None => backend(err),
                });
            }
            next = next.saturating_add(1);
        }

        tx.commit().await.map_err(backend)?;

        let last = next.saturating_sub(1);
        debug!(revision = last, "events committed");
        Ok(last)
    }
}

fn recorded_from_row(row: &PgRow) -> Result<RecordedEvent, StoreError> {
    let revision: i64 = row.try_get("revision").map_err(backend)?;
    let event_id: Uuid = row.try_get("event_id").map_err(backend)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(backend)?;
    Ok(RecordedEvent {
        stream_name: row.try_get("stream_name").map_err(backend)?,
        revision: from_db_revision(revision)?,
        envelope: EventEnvelope {
            event_id,
            event_type: row.try_get("event_type").map_err(backend)?,
            payload: row.try_get("payload").map_err(backend)?,
            metadata: row.try_get("metadata").map_err(backend)?,
            created_at,
        },
    })
}

fn unique_violation(err: &sqlx::Error) -> Option<UniqueViolation> {
    let db_err = err.as_database_error()?;
    if db_err.code().is_none_or(|code| code != UNIQUE_VIOLATION) {
        return None;
    }
    match db_err.constraint() {
        Some(STREAM_REVISION_KEY) => Some(UniqueViolation::StreamRevision),
        Some(EVENT_ID_KEY) => Some(UniqueViolation::EventId),
        _ => None,
    }
}

#[allow(clippy::needless_pass_by_value)]
fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn from_db_revision(revision: i64) -> Result<u64, StoreError> {
    u64::try_from(revision)
        .map_err(|_| StoreError::Backend(format!("negative revision {revision} in stream_events")))
}

fn to_db_revision(revision: u64) -> Result<i64, StoreError> {
    i64::try_from(revision)
        .map_err(|_| StoreError::Backend(format!("revision {revision} does not fit in BIGINT")))
}

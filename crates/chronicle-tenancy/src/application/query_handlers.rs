//! Query handlers for the Tenancy context.
//!
//! Views are rebuilt from the event stream on every call; there is no
//! projection store.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{Aggregate, AggregateRoot};
use chronicle_core::cancel::CancelSignal;
use chronicle_core::codec::CodecError;
use chronicle_core::error::DomainError;
use chronicle_core::message::EventMetadata;
use chronicle_core::repository::AggregateRepository;
use chronicle_core::store::RecordedEvent;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Tenant, TenantStatus};

/// Read-only view of a tenant.
#[derive(Debug, Serialize)]
pub struct TenantView {
    /// The tenant identifier.
    pub tenant_id: Uuid,
    /// Display name.
    pub name: String,
    /// Lifecycle stage.
    pub status: TenantStatus,
    /// Enabled feature keys, sorted.
    pub features: Vec<String>,
    /// Revision of the last applied event.
    pub revision: Option<u64>,
}

/// One entry of a tenant's audit trail.
#[derive(Debug, Serialize)]
pub struct TenantHistoryEntry {
    /// Position within the stream.
    pub revision: u64,
    /// Globally unique event identifier.
    pub event_id: Uuid,
    /// Registered event type name.
    pub event_type: String,
    /// When the event was appended.
    pub created_at: DateTime<Utc>,
    /// Correlation id of the command that raised the event, when recorded.
    pub correlation_id: Option<Uuid>,
    /// The event payload.
    pub payload: serde_json::Value,
}

/// Retrieves a tenant by id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the tenant does not exist,
/// `DomainError::AggregateDeleted` if it has been deleted, or another
/// `DomainError` if the stream cannot be replayed.
pub async fn get_tenant(
    tenant_id: Uuid,
    repo: &AggregateRepository,
    cancel: &CancelSignal,
) -> Result<TenantView, DomainError> {
    let root = repo.get_by_id::<Tenant>(tenant_id, cancel).await?;
    if root.is_deleted() {
        return Err(DomainError::AggregateDeleted {
            aggregate_type: Tenant::NAME,
            aggregate_id: tenant_id,
        });
    }
    let state = root.state();
    Ok(TenantView {
        tenant_id,
        name: state.name.clone(),
        status: state.status,
        features: state.features.iter().cloned().collect(),
        revision: root.revision(),
    })
}

/// Lists every event of a tenant's stream that this build understands,
/// deleted tenants included. Events of unknown types are skipped.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if nothing decodable exists,
/// or another `DomainError` if the stream cannot be read.
pub async fn get_tenant_history(
    tenant_id: Uuid,
    repo: &AggregateRepository,
    cancel: &CancelSignal,
) -> Result<Vec<TenantHistoryEntry>, DomainError> {
    let registry = repo.codec().registry().clone();
    let resolver = move |_: &RecordedEvent| registry.find_by_type::<EventMetadata>().copied();
    let stream = AggregateRoot::<Tenant>::stream_name_for(tenant_id);

    let events = repo.scan_stream(&stream, Some(&resolver), cancel).await?;
    if events.is_empty() {
        return Err(DomainError::AggregateNotFound {
            aggregate_type: Tenant::NAME,
            aggregate_id: tenant_id,
        });
    }

    events
        .into_iter()
        .map(|event| -> Result<TenantHistoryEntry, DomainError> {
            let payload = event.message.to_value().map_err(CodecError::from)?;
            let correlation_id = event
                .metadata
                .as_deref()
                .and_then(|metadata| metadata.downcast_ref::<EventMetadata>())
                .map(|metadata| metadata.correlation_id);
            Ok(TenantHistoryEntry {
                revision: event.revision,
                event_id: event.event_id,
                event_type: event.event_type,
                created_at: event.created_at,
                correlation_id,
                payload,
            })
        })
        .collect()
}

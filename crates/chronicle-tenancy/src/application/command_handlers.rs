//! Command handlers for the Tenancy context.
//!
//! Each handler loads the tenant, applies the command, and saves. A save
//! that loses an optimistic-concurrency race is retried from a fresh load a
//! bounded number of times; validation failures are never retried.

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::cancel::CancelSignal;
use chronicle_core::command::Command;
use chronicle_core::error::DomainError;
use chronicle_core::repository::AggregateRepository;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Tenant, TenantBehaviour};
use crate::domain::commands::{DeleteTenant, RegisterTenant, RenameTenant, ToggleFeature};

/// How many times a command is attempted when saves keep conflicting.
pub const MAX_ATTEMPTS: u32 = 3;

/// Loads the tenant, runs `decide` on it and saves, retrying on version
/// mismatches.
async fn execute<F>(
    tenant_id: Uuid,
    repo: &AggregateRepository,
    cancel: &CancelSignal,
    mut decide: F,
) -> Result<Option<u64>, DomainError>
where
    F: FnMut(&mut AggregateRoot<Tenant>) -> Result<(), DomainError> + Send,
{
    let mut attempt = 1;
    loop {
        let mut root = repo.get_by_id::<Tenant>(tenant_id, cancel).await?;
        decide(&mut root)?;
        match repo.save(&mut root, cancel).await {
            Err(err) if err.is_version_mismatch() && attempt < MAX_ATTEMPTS => {
                warn!(attempt, %tenant_id, "concurrent write detected, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Handles the `RegisterTenant` command: creates the tenant stream.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the name is blank, or
/// `DomainError::VersionMismatch` if the tenant already exists.
#[instrument(skip_all, fields(command = command.command_type(), tenant_id = %command.tenant_id))]
pub async fn handle_register_tenant(
    command: &RegisterTenant,
    repo: &AggregateRepository,
    cancel: &CancelSignal,
) -> Result<Option<u64>, DomainError> {
    let mut root = AggregateRoot::<Tenant>::new(command.tenant_id);
    root.register(&command.name, command.event_metadata())?;
    let revision = repo.save(&mut root, cancel).await?;
    info!("tenant registered");
    Ok(revision)
}

/// Handles the `RenameTenant` command.
///
/// # Errors
///
/// Returns `DomainError` if the tenant is missing or deleted, the name is
/// blank, or persistence fails.
#[instrument(skip_all, fields(command = command.command_type(), tenant_id = %command.tenant_id))]
pub async fn handle_rename_tenant(
    command: &RenameTenant,
    repo: &AggregateRepository,
    cancel: &CancelSignal,
) -> Result<Option<u64>, DomainError> {
    execute(command.tenant_id, repo, cancel, |root| {
        root.rename(&command.name, command.event_metadata())
    })
    .await
}

/// Handles the `ToggleFeature` command.
///
/// # Errors
///
/// Returns `DomainError` if the tenant is missing or deleted, the feature
/// key is blank, or persistence fails.
#[instrument(skip_all, fields(command = command.command_type(), tenant_id = %command.tenant_id))]
pub async fn handle_toggle_feature(
    command: &ToggleFeature,
    repo: &AggregateRepository,
    cancel: &CancelSignal,
) -> Result<Option<u64>, DomainError> {
    execute(command.tenant_id, repo, cancel, |root| {
        root.set_feature(&command.feature, command.enabled, command.event_metadata())
    })
    .await
}

/// Handles the `DeleteTenant` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateDeleted` if the tenant is already
/// deleted, or another `DomainError` if it is missing or persistence fails.
#[instrument(skip_all, fields(command = command.command_type(), tenant_id = %command.tenant_id))]
pub async fn handle_delete_tenant(
    command: &DeleteTenant,
    repo: &AggregateRepository,
    cancel: &CancelSignal,
) -> Result<Option<u64>, DomainError> {
    let revision = execute(command.tenant_id, repo, cancel, |root| {
        root.delete(command.event_metadata())
    })
    .await?;
    info!("tenant deleted");
    Ok(revision)
}

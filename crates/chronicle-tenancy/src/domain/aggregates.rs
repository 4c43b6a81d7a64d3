//! Aggregate roots for the Tenancy context.

use std::collections::BTreeSet;

use chronicle_core::aggregate::{Aggregate, AggregateRoot};
use chronicle_core::error::DomainError;
use chronicle_core::message::{AnyMessage, EventMetadata};
use serde::Serialize;

use super::events::{FeatureToggled, TenantDeleted, TenantRegistered, TenantRenamed};

/// Lifecycle stage of a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// No registration event has been applied.
    #[default]
    Unregistered,
    /// Registered and writable.
    Active,
    /// Deleted; no further events may be raised.
    Deleted,
}

/// State of a tenant, folded from its events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tenant {
    /// Lifecycle stage.
    pub status: TenantStatus,
    /// Display name.
    pub name: String,
    /// Enabled feature keys.
    pub features: BTreeSet<String>,
}

impl Aggregate for Tenant {
    const NAME: &'static str = "Tenant";

    fn apply(&mut self, event: &dyn AnyMessage) {
        if let Some(registered) = event.downcast_ref::<TenantRegistered>() {
            self.status = TenantStatus::Active;
            self.name.clone_from(&registered.name);
        } else if let Some(renamed) = event.downcast_ref::<TenantRenamed>() {
            self.name.clone_from(&renamed.name);
        } else if let Some(toggled) = event.downcast_ref::<FeatureToggled>() {
            if toggled.enabled {
                self.features.insert(toggled.feature.clone());
            } else {
                self.features.remove(&toggled.feature);
            }
        } else if event.is::<TenantDeleted>() {
            self.status = TenantStatus::Deleted;
        }
    }

    fn is_deleted(&self) -> bool {
        self.status == TenantStatus::Deleted
    }
}

fn require_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation("tenant name must not be empty".into()));
    }
    Ok(trimmed.to_owned())
}

fn require_active(root: &AggregateRoot<Tenant>) -> Result<(), DomainError> {
    match root.state().status {
        TenantStatus::Active => Ok(()),
        TenantStatus::Unregistered => Err(DomainError::Validation(format!(
            "tenant {} is not registered",
            root.id()
        ))),
        TenantStatus::Deleted => Err(DomainError::AggregateDeleted {
            aggregate_type: Tenant::NAME,
            aggregate_id: root.id(),
        }),
    }
}

/// Tenant behaviour on top of the generic aggregate root.
///
/// Each method validates against the current state and raises at most one
/// event. Requests that would not change the state raise nothing.
pub trait TenantBehaviour {
    /// Registers the tenant under `name`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tenant is already registered
    /// or the name is blank.
    fn register(&mut self, name: &str, metadata: EventMetadata) -> Result<(), DomainError>;

    /// Renames the tenant.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tenant is not active or the
    /// name is blank, or `DomainError::AggregateDeleted` if it is deleted.
    fn rename(&mut self, name: &str, metadata: EventMetadata) -> Result<(), DomainError>;

    /// Switches a feature flag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tenant is not active or the
    /// feature key is blank, or `DomainError::AggregateDeleted` if it is
    /// deleted.
    fn set_feature(
        &mut self,
        feature: &str,
        enabled: bool,
        metadata: EventMetadata,
    ) -> Result<(), DomainError>;

    /// Deletes the tenant.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tenant was never registered,
    /// or `DomainError::AggregateDeleted` if it is already deleted.
    fn delete(&mut self, metadata: EventMetadata) -> Result<(), DomainError>;
}

impl TenantBehaviour for AggregateRoot<Tenant> {
    fn register(&mut self, name: &str, metadata: EventMetadata) -> Result<(), DomainError> {
        if self.state().status != TenantStatus::Unregistered {
            return Err(DomainError::Validation(format!(
                "tenant {} is already registered",
                self.id()
            )));
        }
        let name = require_name(name)?;
        let tenant_id = self.id();
        self.raise_with_metadata(TenantRegistered { tenant_id, name }, metadata)
    }

    fn rename(&mut self, name: &str, metadata: EventMetadata) -> Result<(), DomainError> {
        require_active(self)?;
        let name = require_name(name)?;
        if self.state().name == name {
            return Ok(());
        }
        let tenant_id = self.id();
        self.raise_with_metadata(TenantRenamed { tenant_id, name }, metadata)
    }

    fn set_feature(
        &mut self,
        feature: &str,
        enabled: bool,
        metadata: EventMetadata,
    ) -> Result<(), DomainError> {
        require_active(self)?;
        let feature = feature.trim();
        if feature.is_empty() {
            return Err(DomainError::Validation("feature key must not be empty".into()));
        }
        if self.state().features.contains(feature) == enabled {
            return Ok(());
        }
        let tenant_id = self.id();
        self.raise_with_metadata(
            FeatureToggled {
                tenant_id,
                feature: feature.to_owned(),
                enabled,
            },
            metadata,
        )
    }

    fn delete(&mut self, metadata: EventMetadata) -> Result<(), DomainError> {
        require_active(self)?;
        let tenant_id = self.id();
        self.raise_with_metadata(TenantDeleted { tenant_id }, metadata)
    }
}

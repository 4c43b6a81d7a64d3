//! Domain events for the Tenancy context.

use chronicle_core::message::Message;
use chronicle_core::registry::{MessageDescriptor, MessageSource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted when a tenant is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRegistered {
    /// The tenant identifier.
    pub tenant_id: Uuid,
    /// Display name.
    pub name: String,
}

impl Message for TenantRegistered {
    const TYPE_NAME: &'static str = "tenancy.tenant_registered";
}

/// Emitted when a tenant's display name changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRenamed {
    /// The tenant identifier.
    pub tenant_id: Uuid,
    /// The new display name.
    pub name: String,
}

impl Message for TenantRenamed {
    const TYPE_NAME: &'static str = "tenancy.tenant_renamed";
}

/// Emitted when a feature flag is switched on or off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggled {
    /// The tenant identifier.
    pub tenant_id: Uuid,
    /// Feature key.
    pub feature: String,
    /// New state of the flag.
    pub enabled: bool,
}

impl Message for FeatureToggled {
    const TYPE_NAME: &'static str = "tenancy.feature_toggled";
}

/// Emitted when a tenant is deleted. Terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDeleted {
    /// The tenant identifier.
    pub tenant_id: Uuid,
}

impl Message for TenantDeleted {
    const TYPE_NAME: &'static str = "tenancy.tenant_deleted";
}

/// Registers the Tenancy event types.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenancyMessages;

impl MessageSource for TenancyMessages {
    fn name(&self) -> &'static str {
        "chronicle-tenancy"
    }

    fn descriptors(&self) -> Vec<MessageDescriptor> {
        vec![
            MessageDescriptor::of::<TenantRegistered>(),
            MessageDescriptor::of::<TenantRenamed>(),
            MessageDescriptor::of::<FeatureToggled>(),
            MessageDescriptor::of::<TenantDeleted>(),
        ]
    }
}

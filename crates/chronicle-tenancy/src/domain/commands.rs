//! Commands for the Tenancy context.

use chronicle_core::command::Command;
use uuid::Uuid;

/// Command to register a new tenant.
#[derive(Debug, Clone)]
pub struct RegisterTenant {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant identifier to register.
    pub tenant_id: Uuid,
    /// Display name.
    pub name: String,
}

impl Command for RegisterTenant {
    fn command_type(&self) -> &'static str {
        "tenancy.register_tenant"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to rename a tenant.
#[derive(Debug, Clone)]
pub struct RenameTenant {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant identifier.
    pub tenant_id: Uuid,
    /// The new display name.
    pub name: String,
}

impl Command for RenameTenant {
    fn command_type(&self) -> &'static str {
        "tenancy.rename_tenant"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to switch a feature flag.
#[derive(Debug, Clone)]
pub struct ToggleFeature {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant identifier.
    pub tenant_id: Uuid,
    /// Feature key.
    pub feature: String,
    /// Desired state of the flag.
    pub enabled: bool,
}

impl Command for ToggleFeature {
    fn command_type(&self) -> &'static str {
        "tenancy.toggle_feature"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete a tenant.
#[derive(Debug, Clone)]
pub struct DeleteTenant {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant identifier.
    pub tenant_id: Uuid,
}

impl Command for DeleteTenant {
    fn command_type(&self) -> &'static str {
        "tenancy.delete_tenant"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

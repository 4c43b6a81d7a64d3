//! Seed data for the Tenancy context.

use chronicle_core::aggregate::{AggregateRoot, EventSourced};
use chronicle_core::error::DomainError;
use chronicle_core::message::EventMetadata;
use chronicle_core::seeding::SeedSource;
use uuid::Uuid;

use crate::domain::aggregates::{Tenant, TenantBehaviour};

/// Identifier of the tenant every deployment starts with.
pub const DEFAULT_TENANT_ID: Uuid = Uuid::from_u128(0x0193_0000_0000_7000_8000_0000_0000_0001);

/// Correlation id stamped on seeded events.
pub const SEED_CORRELATION_ID: Uuid = Uuid::from_u128(0x0193_0000_0000_7000_8000_0000_0000_5eed);

/// The default tenant: registered, with its initial feature flags on.
///
/// Extending `features` in a later release appends only the new toggles to
/// an already seeded stream.
#[derive(Debug, Clone)]
pub struct DefaultTenantSeed {
    /// Tenant identifier.
    pub tenant_id: Uuid,
    /// Display name.
    pub name: String,
    /// Features switched on, in order.
    pub features: Vec<String>,
}

impl Default for DefaultTenantSeed {
    fn default() -> Self {
        Self {
            tenant_id: DEFAULT_TENANT_ID,
            name: "Default".into(),
            features: vec!["audit_log".into()],
        }
    }
}

impl SeedSource for DefaultTenantSeed {
    fn name(&self) -> &str {
        "default-tenant"
    }

    fn build(&self) -> Result<Box<dyn EventSourced>, DomainError> {
        let metadata = EventMetadata::for_command(SEED_CORRELATION_ID);
        let mut root = AggregateRoot::<Tenant>::new(self.tenant_id);
        root.register(&self.name, metadata.clone())?;
        for feature in &self.features {
            root.set_feature(feature, true, metadata.clone())?;
        }
        Ok(Box::new(root))
    }
}

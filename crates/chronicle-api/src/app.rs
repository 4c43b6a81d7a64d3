//! Wiring shared by the binary and the integration tests.

use std::sync::Arc;

use axum::Router;
use chronicle_core::cancel::CancelSignal;
use chronicle_core::clock::Clock;
use chronicle_core::codec::{CodecOptions, EventCodec};
use chronicle_core::error::DomainError;
use chronicle_core::message::CoreMessages;
use chronicle_core::registry::{RegistryError, TypeRegistry};
use chronicle_core::seeding::{AggregateSeeder, EventSeeder, SeedOutcome, SeedVerification};
use chronicle_core::store::EventStore;
use chronicle_tenancy::domain::events::TenancyMessages;
use chronicle_tenancy::seed::DefaultTenantSeed;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::AppState;

/// Builds the registry of every message type this server understands.
///
/// # Errors
///
/// Returns `RegistryError` if two sources claim the same type or name.
pub fn build_registry() -> Result<TypeRegistry, RegistryError> {
    TypeRegistry::build(&[&CoreMessages, &TenancyMessages])
}

/// Builds the codec over a freshly built registry.
///
/// # Errors
///
/// Returns `RegistryError` if the registry cannot be built.
pub fn build_codec(options: CodecOptions) -> Result<EventCodec, RegistryError> {
    Ok(EventCodec::new(Arc::new(build_registry()?), options))
}

/// The seeding orchestrator with every seed source of the deployment.
#[must_use]
pub fn build_seeder(
    store: Arc<dyn EventStore>,
    codec: EventCodec,
    clock: Arc<dyn Clock>,
    verification: SeedVerification,
) -> AggregateSeeder {
    let seeder = EventSeeder::new(store, codec, clock).with_verification(verification);
    AggregateSeeder::new(seeder).with_source(DefaultTenantSeed::default())
}

/// Runs every seed source once.
///
/// # Errors
///
/// Returns the first `DomainError` raised by a seed source.
pub async fn run_seeders(
    seeder: &AggregateSeeder,
    cancel: &CancelSignal,
) -> Result<Vec<SeedOutcome>, DomainError> {
    let outcomes = seeder.run(cancel).await?;
    let published: usize = outcomes.iter().map(|o| o.published).sum();
    tracing::info!(sources = outcomes.len(), published, "seeding complete");
    Ok(outcomes)
}

/// Builds the full HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/tenants", routes::tenants::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

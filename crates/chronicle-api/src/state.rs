//! Shared application state.

use std::sync::Arc;

use chronicle_core::cancel::CancelSignal;
use chronicle_core::repository::AggregateRepository;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loads and saves aggregates.
    pub repository: Arc<AggregateRepository>,
    /// Fires when the server begins shutting down; in-flight store calls
    /// abort instead of holding the process open.
    pub shutdown: CancelSignal,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(repository: AggregateRepository, shutdown: CancelSignal) -> Self {
        Self {
            repository: Arc::new(repository),
            shutdown,
        }
    }
}

//! Time source for envelope timestamps.

use chrono::{DateTime, Utc};

/// Supplies the `created_at` timestamp stamped onto appended events.
///
/// Injected into the repository and the seeder so tests can pin time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

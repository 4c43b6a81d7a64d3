//! Command abstractions.

use uuid::Uuid;

use crate::message::EventMetadata;

/// An intent to change one aggregate.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// Metadata attached to every event the command raises.
    fn event_metadata(&self) -> EventMetadata {
        EventMetadata::for_command(self.correlation_id())
    }
}

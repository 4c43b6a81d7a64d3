//! Message abstractions shared by events and event metadata.

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::{MessageDescriptor, MessageSource};

/// Trait implemented by every payload that can travel through the codec.
///
/// `TYPE_NAME` is the fully-qualified name written next to the payload bytes
/// in the store. It must stay stable once events of that type are persisted.
pub trait Message:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Fully-qualified type name used for registry lookups.
    const TYPE_NAME: &'static str;
}

/// Object-safe view over any registered [`Message`].
///
/// Aggregates receive events as `&dyn AnyMessage` and downcast to the
/// concrete types they understand.
pub trait AnyMessage: fmt::Debug + Send + Sync {
    /// The registered type name of the underlying message.
    fn type_name(&self) -> &'static str;

    /// Access to the concrete value for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts the message to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the message cannot be represented as
    /// JSON (for example a map with non-string keys).
    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error>;
}

impl<T: Message> AnyMessage for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl dyn AnyMessage + '_ {
    /// Returns the concrete message if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns `true` if the underlying message is a `T`.
    #[must_use]
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Tracing metadata attached to raised events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
}

impl EventMetadata {
    /// Metadata for an event caused directly by a command.
    #[must_use]
    pub fn for_command(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            causation_id: correlation_id,
        }
    }
}

impl Message for EventMetadata {
    const TYPE_NAME: &'static str = "chronicle.event_metadata";
}

/// Message source for the types defined by this crate.
#[derive(Debug, Clone, Copy)]
pub struct CoreMessages;

impl MessageSource for CoreMessages {
    fn name(&self) -> &'static str {
        "chronicle-core"
    }

    fn descriptors(&self) -> Vec<MessageDescriptor> {
        vec![MessageDescriptor::of::<EventMetadata>()]
    }
}

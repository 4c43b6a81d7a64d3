//! Event codec.
//!
//! Payloads and metadata are encoded as JSON objects. The codec resolves
//! concrete types through the [`TypeRegistry`]; it only guarantees semantic
//! round-tripping, never byte-for-byte equality.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::aggregate::PendingEvent;
use crate::message::{AnyMessage, Message};
use crate::registry::{MessageDescriptor, TypeRegistry};
use crate::store::{EventEnvelope, RecordedEvent};

/// How a message's field names are written to the wire.
///
/// The policy applies to the top-level fields of struct messages, as
/// declared by their [`MessageDescriptor`]. Nested values, map keys and
/// enum variant tags are written exactly as serde produces them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamingPolicy {
    /// Field names are written exactly as serde produces them.
    #[default]
    Preserve,
    /// `snake_case` field names are written as `camelCase` and mapped back
    /// to the declared names on decode.
    CamelCase,
}

/// Serializer settings passed to [`EventCodec::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecOptions {
    /// Field naming on the wire.
    pub naming_policy: NamingPolicy,
    /// Drop top-level message fields whose value is `null` when encoding.
    pub omit_null_fields: bool,
}

/// Errors raised while encoding or decoding messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The type name is not present in the registry.
    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),

    /// The message's native type was never registered.
    #[error("message type `{0}` is not registered")]
    UnregisteredType(&'static str),

    /// The payload could not be converted to or from JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Chooses a metadata descriptor for a recorded event, if any.
pub type MetadataResolver<'a> =
    &'a (dyn Fn(&RecordedEvent) -> Option<MessageDescriptor> + Send + Sync);

/// A recorded event decoded into native messages.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    /// Globally unique event identifier.
    pub event_id: Uuid,
    /// Registered type name of the payload.
    pub event_type: String,
    /// Position within the stream.
    pub revision: u64,
    /// Timestamp of event creation.
    pub created_at: DateTime<Utc>,
    /// The decoded payload.
    pub message: Arc<dyn AnyMessage>,
    /// The decoded metadata, when it was requested and present.
    pub metadata: Option<Arc<dyn AnyMessage>>,
}

/// Registry-backed JSON codec for event payloads and metadata.
#[derive(Debug, Clone)]
pub struct EventCodec {
    registry: Arc<TypeRegistry>,
    options: CodecOptions,
}

impl EventCodec {
    /// Creates a codec over a built registry.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>, options: CodecOptions) -> Self {
        Self { registry, options }
    }

    /// The registry this codec resolves types with.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The serializer settings in effect.
    #[must_use]
    pub const fn options(&self) -> CodecOptions {
        self.options
    }

    /// Encodes a message.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnregisteredType` if the message's native type is
    /// not in the registry, or `CodecError::Json` if it cannot be serialized.
    pub fn serialize(&self, message: &dyn AnyMessage) -> Result<Vec<u8>, CodecError> {
        let type_id = Any::type_id(message.as_any());
        let descriptor = self
            .registry
            .find_by_type_id(type_id)
            .ok_or_else(|| CodecError::UnregisteredType(message.type_name()))?;
        let value = self.outgoing(descriptor, message.to_value()?);
        Ok(serde_json::to_vec(&value)?)
    }

    /// Decodes bytes into the native type registered under `type_name`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnknownEventKind` if `type_name` is not
    /// registered, or `CodecError::Json` if the bytes do not match the type.
    pub fn deserialize(
        &self,
        bytes: &[u8],
        type_name: &str,
    ) -> Result<Arc<dyn AnyMessage>, CodecError> {
        let descriptor = self
            .registry
            .find_by_name(type_name)
            .ok_or_else(|| CodecError::UnknownEventKind(type_name.to_owned()))?;
        self.decode_with(descriptor, bytes)
    }

    /// Decodes bytes straight into `T`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnregisteredType` if `T` is not registered, or
    /// `CodecError::Json` if the bytes do not match `T`.
    pub fn deserialize_as<T: Message>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let descriptor = self
            .registry
            .find_by_type::<T>()
            .ok_or(CodecError::UnregisteredType(T::TYPE_NAME))?;
        let value = self.incoming(descriptor, serde_json::from_slice(bytes)?);
        Ok(serde_json::from_value(value)?)
    }

    /// Encodes a raised event into an envelope ready for appending.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the payload or metadata cannot be encoded.
    pub fn encode_pending(
        &self,
        event: &PendingEvent,
        created_at: DateTime<Utc>,
    ) -> Result<EventEnvelope, CodecError> {
        let payload = self.serialize(&*event.message)?;
        let metadata = event
            .metadata
            .as_deref()
            .map(|metadata| self.serialize(metadata))
            .transpose()?;
        Ok(EventEnvelope {
            event_id: event.event_id,
            event_type: event.message.type_name().to_owned(),
            payload,
            metadata,
            created_at,
        })
    }

    /// Decodes a recorded event's payload, failing on unknown types.
    ///
    /// Metadata is not decoded. This is the path used for full replays,
    /// where every event must be understood.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnknownEventKind` if the payload type is not
    /// registered, or `CodecError::Json` if the payload is malformed.
    pub fn deserialize_envelope(
        &self,
        recorded: &RecordedEvent,
    ) -> Result<DecodedEvent, CodecError> {
        let envelope = &recorded.envelope;
        let message = self.deserialize(&envelope.payload, &envelope.event_type)?;
        Ok(DecodedEvent {
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            revision: recorded.revision,
            created_at: envelope.created_at,
            message,
            metadata: None,
        })
    }

    /// Decodes a recorded event, returning `Ok(None)` when the payload type
    /// is unknown so stream scanners can skip foreign events.
    ///
    /// Metadata is decoded only when a resolver is supplied, it returns a
    /// descriptor, and the envelope carries non-empty metadata bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Json` if a known payload or the resolved metadata
    /// is malformed.
    pub fn try_deserialize_envelope(
        &self,
        recorded: &RecordedEvent,
        resolver: Option<MetadataResolver<'_>>,
    ) -> Result<Option<DecodedEvent>, CodecError> {
        let envelope = &recorded.envelope;
        let Some(descriptor) = self.registry.find_by_name(&envelope.event_type) else {
            return Ok(None);
        };
        let message = self.decode_with(descriptor, &envelope.payload)?;

        let metadata = match (resolver, envelope.metadata.as_deref()) {
            (Some(resolve), Some(bytes)) if !bytes.is_empty() => resolve(recorded)
                .map(|descriptor| self.decode_with(&descriptor, bytes))
                .transpose()?,
            _ => None,
        };

        Ok(Some(DecodedEvent {
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            revision: recorded.revision,
            created_at: envelope.created_at,
            message,
            metadata,
        }))
    }

    fn decode_with(
        &self,
        descriptor: &MessageDescriptor,
        bytes: &[u8],
    ) -> Result<Arc<dyn AnyMessage>, CodecError> {
        let value = self.incoming(descriptor, serde_json::from_slice(bytes)?);
        Ok(descriptor.decode(value)?)
    }

    /// Applies the options to the message's own fields. Nested values and
    /// keys the descriptor does not declare (map entries, flattened data)
    /// are written untouched.
    fn outgoing(&self, descriptor: &MessageDescriptor, value: Value) -> Value {
        let Value::Object(map) = value else {
            return value;
        };
        let fields = descriptor.fields();
        let map = map
            .into_iter()
            .filter(|(key, value)| {
                !(self.options.omit_null_fields && value.is_null() && is_field(fields, key))
            })
            .map(|(key, value)| match self.options.naming_policy {
                NamingPolicy::CamelCase if is_field(fields, &key) => {
                    (snake_to_camel(&key), value)
                }
                _ => (key, value),
            })
            .collect::<Map<String, Value>>();
        Value::Object(map)
    }

    /// Maps wire names back to the exact declared field names. Keys that
    /// are not the wire form of a declared field pass through, so payloads
    /// written under `Preserve` still decode.
    fn incoming(&self, descriptor: &MessageDescriptor, value: Value) -> Value {
        if self.options.naming_policy == NamingPolicy::Preserve {
            return value;
        }
        let Value::Object(map) = value else {
            return value;
        };
        let map = map
            .into_iter()
            .map(|(key, value)| {
                match descriptor
                    .fields()
                    .iter()
                    .find(|field| snake_to_camel(field) == key)
                {
                    Some(field) => ((*field).to_owned(), value),
                    None => (key, value),
                }
            })
            .collect::<Map<String, Value>>();
        Value::Object(map)
    }
}

fn is_field(fields: &[&str], key: &str) -> bool {
    fields.contains(&key)
}

/// Wire form of a field name under [`NamingPolicy::CamelCase`]. Not
/// invertible on its own (`line_2` and `line2` both become `line2`), so
/// decoding matches against the declared names instead of reversing it.
pub(crate) fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (index, ch) in name.chars().enumerate() {
        if ch == '_' && index > 0 {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::message::{CoreMessages, EventMetadata};
    use crate::registry::MessageSource;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ShipmentDispatched {
        shipment_id: Uuid,
        carrier_name: String,
        tracking_code: Option<String>,
        parcel_weights: Vec<u32>,
    }

    impl Message for ShipmentDispatched {
        const TYPE_NAME: &'static str = "logistics.shipment_dispatched";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum ShipmentStatus {
        Held { reason_code: String },
        Released,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ShipmentStatusChanged {
        new_status: ShipmentStatus,
    }

    impl Message for ShipmentStatusChanged {
        const TYPE_NAME: &'static str = "logistics.shipment_status_changed";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct WarehouseRelocated {
        address_line_2: String,
        bay_limits: BTreeMap<String, u32>,
    }

    impl Message for WarehouseRelocated {
        const TYPE_NAME: &'static str = "logistics.warehouse_relocated";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct DockScheduleSet {
        slots: BTreeMap<String, Option<u32>>,
    }

    impl Message for DockScheduleSet {
        const TYPE_NAME: &'static str = "logistics.dock_schedule_set";
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct NeverRegistered;

    impl Message for NeverRegistered {
        const TYPE_NAME: &'static str = "logistics.never_registered";
    }

    struct LogisticsMessages;

    impl MessageSource for LogisticsMessages {
        fn name(&self) -> &'static str {
            "logistics"
        }

        fn descriptors(&self) -> Vec<MessageDescriptor> {
            vec![
                MessageDescriptor::of::<ShipmentDispatched>(),
                MessageDescriptor::of::<ShipmentStatusChanged>(),
                MessageDescriptor::of::<WarehouseRelocated>(),
                MessageDescriptor::of::<DockScheduleSet>(),
            ]
        }
    }

    fn codec(options: CodecOptions) -> EventCodec {
        let registry = TypeRegistry::build(&[&CoreMessages, &LogisticsMessages]).unwrap();
        EventCodec::new(Arc::new(registry), options)
    }

    fn dispatched() -> ShipmentDispatched {
        ShipmentDispatched {
            shipment_id: Uuid::new_v4(),
            carrier_name: "Northwind".to_owned(),
            tracking_code: None,
            parcel_weights: vec![12, 40],
        }
    }

    fn recorded(event_type: &str, payload: Vec<u8>, metadata: Option<Vec<u8>>) -> RecordedEvent {
        RecordedEvent {
            stream_name: "Shipment-1".to_owned(),
            revision: 7,
            envelope: EventEnvelope {
                event_id: Uuid::new_v4(),
                event_type: event_type.to_owned(),
                payload,
                metadata,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_round_trip_preserves_every_registered_type() {
        // Arrange
        let codec = codec(CodecOptions::default());
        let event = dispatched();
        let status = ShipmentStatusChanged {
            new_status: ShipmentStatus::Held {
                reason_code: "customs".to_owned(),
            },
        };
        let metadata = EventMetadata::for_command(Uuid::new_v4());

        // Act
        let event_bytes = codec.serialize(&event).unwrap();
        let status_bytes = codec.serialize(&status).unwrap();
        let metadata_bytes = codec.serialize(&metadata).unwrap();

        // Assert
        let decoded = codec
            .deserialize(&event_bytes, ShipmentDispatched::TYPE_NAME)
            .unwrap();
        assert_eq!(decoded.downcast_ref::<ShipmentDispatched>(), Some(&event));
        let decoded = codec
            .deserialize(&status_bytes, ShipmentStatusChanged::TYPE_NAME)
            .unwrap();
        assert_eq!(decoded.downcast_ref::<ShipmentStatusChanged>(), Some(&status));
        let decoded: EventMetadata = codec.deserialize_as(&metadata_bytes).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn test_camel_case_policy_renames_only_top_level_fields() {
        // Arrange
        let codec = codec(CodecOptions {
            naming_policy: NamingPolicy::CamelCase,
            omit_null_fields: false,
        });
        let status = ShipmentStatusChanged {
            new_status: ShipmentStatus::Held {
                reason_code: "customs".to_owned(),
            },
        };

        // Act
        let bytes = codec.serialize(&status).unwrap();

        // Assert
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({ "newStatus": { "Held": { "reason_code": "customs" } } })
        );
        let decoded: ShipmentStatusChanged = codec.deserialize_as(&bytes).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_camel_case_round_trips_digit_suffixed_fields_and_map_keys() {
        // Arrange
        let codec = codec(CodecOptions {
            naming_policy: NamingPolicy::CamelCase,
            omit_null_fields: false,
        });
        let event = WarehouseRelocated {
            address_line_2: "Dock 4".to_owned(),
            bay_limits: BTreeMap::from([
                ("maxPallets".to_owned(), 40),
                ("cold_storage".to_owned(), 6),
            ]),
        };

        // Act
        let bytes = codec.serialize(&event).unwrap();

        // Assert
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({
                "addressLine2": "Dock 4",
                "bayLimits": { "cold_storage": 6, "maxPallets": 40 }
            })
        );
        let decoded = codec
            .deserialize(&bytes, WarehouseRelocated::TYPE_NAME)
            .unwrap();
        assert_eq!(decoded.downcast_ref::<WarehouseRelocated>(), Some(&event));
        let decoded: WarehouseRelocated = codec.deserialize_as(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_camel_case_decodes_payloads_written_with_declared_names() {
        let preserve = codec(CodecOptions::default());
        let camel = codec(CodecOptions {
            naming_policy: NamingPolicy::CamelCase,
            omit_null_fields: false,
        });
        let event = dispatched();

        let bytes = preserve.serialize(&event).unwrap();

        let decoded: ShipmentDispatched = camel.deserialize_as(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_omit_null_fields_drops_nulls_and_still_decodes() {
        // Arrange
        let codec = codec(CodecOptions {
            naming_policy: NamingPolicy::Preserve,
            omit_null_fields: true,
        });
        let event = dispatched();

        // Act
        let bytes = codec.serialize(&event).unwrap();

        // Assert
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(raw.get("tracking_code").is_none());
        let decoded: ShipmentDispatched = codec.deserialize_as(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_omit_null_fields_keeps_null_map_entries() {
        // Arrange
        let codec = codec(CodecOptions {
            naming_policy: NamingPolicy::Preserve,
            omit_null_fields: true,
        });
        let event = DockScheduleSet {
            slots: BTreeMap::from([("monday".to_owned(), Some(3)), ("sunday".to_owned(), None)]),
        };

        // Act
        let bytes = codec.serialize(&event).unwrap();

        // Assert
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["slots"]["sunday"], Value::Null);
        let decoded: DockScheduleSet = codec.deserialize_as(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_deserialize_tolerates_reformatted_bytes() {
        let codec = codec(CodecOptions::default());
        let event = dispatched();
        let pretty = serde_json::to_vec_pretty(&event).unwrap();

        let decoded = codec
            .deserialize(&pretty, ShipmentDispatched::TYPE_NAME)
            .unwrap();

        assert_eq!(decoded.downcast_ref::<ShipmentDispatched>(), Some(&event));
    }

    #[test]
    fn test_serialize_rejects_unregistered_type() {
        let codec = codec(CodecOptions::default());

        let result = codec.serialize(&NeverRegistered);

        match result.unwrap_err() {
            CodecError::UnregisteredType(name) => {
                assert_eq!(name, "logistics.never_registered");
            }
            other => panic!("expected UnregisteredType, got {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_rejects_unknown_event_kind() {
        let codec = codec(CodecOptions::default());

        let result = codec.deserialize(b"{}", "billing.invoice_paid");

        match result.unwrap_err() {
            CodecError::UnknownEventKind(name) => assert_eq!(name, "billing.invoice_paid"),
            other => panic!("expected UnknownEventKind, got {other:?}"),
        }
    }

    #[test]
    fn test_try_deserialize_envelope_skips_unknown_type() {
        let codec = codec(CodecOptions::default());
        let event = recorded("billing.invoice_paid", b"{}".to_vec(), None);

        let decoded = codec.try_deserialize_envelope(&event, None).unwrap();

        assert!(decoded.is_none());
    }

    #[test]
    fn test_deserialize_envelope_fails_on_unknown_type() {
        let codec = codec(CodecOptions::default());
        let event = recorded("billing.invoice_paid", b"{}".to_vec(), None);

        let result = codec.deserialize_envelope(&event);

        assert!(matches!(result, Err(CodecError::UnknownEventKind(_))));
    }

    #[test]
    fn test_try_deserialize_envelope_decodes_metadata_with_resolver() {
        // Arrange
        let codec = codec(CodecOptions::default());
        let metadata = EventMetadata::for_command(Uuid::new_v4());
        let event = recorded(
            ShipmentDispatched::TYPE_NAME,
            codec.serialize(&dispatched()).unwrap(),
            Some(codec.serialize(&metadata).unwrap()),
        );
        let registry = Arc::clone(codec.registry());
        let resolver = move |_: &RecordedEvent| registry.find_by_type::<EventMetadata>().copied();

        // Act
        let decoded = codec
            .try_deserialize_envelope(&event, Some(&resolver))
            .unwrap()
            .unwrap();

        // Assert
        assert_eq!(decoded.revision, 7);
        assert_eq!(decoded.event_type, ShipmentDispatched::TYPE_NAME);
        assert!(decoded.message.is::<ShipmentDispatched>());
        let decoded_metadata = decoded.metadata.unwrap();
        assert_eq!(
            decoded_metadata.downcast_ref::<EventMetadata>(),
            Some(&metadata)
        );
    }

    #[test]
    fn test_try_deserialize_envelope_ignores_metadata_without_resolver_or_bytes() {
        // Arrange
        let codec = codec(CodecOptions::default());
        let payload = codec.serialize(&dispatched()).unwrap();
        let with_bytes = recorded(
            ShipmentDispatched::TYPE_NAME,
            payload.clone(),
            Some(b"{}".to_vec()),
        );
        let empty_bytes = recorded(ShipmentDispatched::TYPE_NAME, payload, Some(Vec::new()));
        let registry = Arc::clone(codec.registry());
        let resolver = move |_: &RecordedEvent| registry.find_by_type::<EventMetadata>().copied();
        let declining = |_: &RecordedEvent| -> Option<MessageDescriptor> { None };

        // Act
        let no_resolver = codec.try_deserialize_envelope(&with_bytes, None).unwrap();
        let no_descriptor = codec
            .try_deserialize_envelope(&with_bytes, Some(&declining))
            .unwrap();
        let no_bytes = codec
            .try_deserialize_envelope(&empty_bytes, Some(&resolver))
            .unwrap();

        // Assert
        assert!(no_resolver.unwrap().metadata.is_none());
        assert!(no_descriptor.unwrap().metadata.is_none());
        assert!(no_bytes.unwrap().metadata.is_none());
    }

    #[test]
    fn test_snake_to_camel() {
        assert_eq!(snake_to_camel("tracking_code"), "trackingCode");
        assert_eq!(snake_to_camel("address_line_2"), "addressLine2");
        assert_eq!(snake_to_camel("_internal_id"), "_internalId");
        assert_eq!(snake_to_camel("carrier"), "carrier");
    }
}

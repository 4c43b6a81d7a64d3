//! Message type registry.
//!
//! The registry is built once at startup from a fixed set of
//! [`MessageSource`]s and is read-only afterwards. Components receive it as
//! an `Arc<TypeRegistry>` handle; there is no global instance.

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use serde::de::{self, Deserializer, Visitor};
use thiserror::Error;
use tracing::debug;

use crate::codec::snake_to_camel;
use crate::message::{AnyMessage, Message};

/// Decodes a JSON value into a concrete message behind a trait object.
pub type DecodeFn = fn(serde_json::Value) -> Result<Arc<dyn AnyMessage>, serde_json::Error>;

fn decode_value<T: Message>(
    value: serde_json::Value,
) -> Result<Arc<dyn AnyMessage>, serde_json::Error> {
    let message: T = serde_json::from_value(value)?;
    Ok(Arc::new(message))
}

/// Captures the field list serde hands to `deserialize_struct`, then
/// aborts. Every other shape aborts without recording anything.
struct FieldNames<'a> {
    fields: &'a mut Option<&'static [&'static str]>,
}

impl<'de> Deserializer<'de> for FieldNames<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        *self.fields = Some(fields);
        Err(de::Error::custom("field names captured"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

/// Declared field names of `T`, empty when `T` is not a struct.
fn struct_fields<T: Message>() -> &'static [&'static str] {
    let mut fields = None;
    let _: Result<T, _> = serde::Deserialize::deserialize(FieldNames {
        fields: &mut fields,
    });
    fields.unwrap_or_default()
}

/// Structural descriptor for one registered message type.
#[derive(Debug, Clone, Copy)]
pub struct MessageDescriptor {
    type_name: &'static str,
    type_id: TypeId,
    rust_type: &'static str,
    fields: &'static [&'static str],
    decode: DecodeFn,
}

impl MessageDescriptor {
    /// Describes the message type `T`.
    #[must_use]
    pub fn of<T: Message>() -> Self {
        Self {
            type_name: T::TYPE_NAME,
            type_id: TypeId::of::<T>(),
            rust_type: std::any::type_name::<T>(),
            fields: struct_fields::<T>(),
            decode: decode_value::<T>,
        }
    }

    /// The fully-qualified message type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The native type this descriptor decodes into.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The Rust path of the native type, for diagnostics.
    #[must_use]
    pub const fn rust_type(&self) -> &'static str {
        self.rust_type
    }

    /// Top-level field names as serde declares them. Empty for enums,
    /// newtypes and other non-struct messages.
    #[must_use]
    pub const fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// Decodes a JSON value into the described native type.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the value does not match the shape of
    /// the native type.
    pub fn decode(
        &self,
        value: serde_json::Value,
    ) -> Result<Arc<dyn AnyMessage>, serde_json::Error> {
        (self.decode)(value)
    }
}

/// A set of message definitions contributed to the registry, typically one
/// per bounded context.
pub trait MessageSource {
    /// Name of the source, used in collision reports.
    fn name(&self) -> &'static str;

    /// The descriptors this source contributes.
    fn descriptors(&self) -> Vec<MessageDescriptor>;
}

/// Errors raised while building the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two descriptors share the same type name.
    #[error("message type `{type_name}` registered by both `{first_source}` and `{second_source}`")]
    DuplicateTypeName {
        /// The colliding type name.
        type_name: &'static str,
        /// The source that registered the name first.
        first_source: &'static str,
        /// The source that attempted to register it again.
        second_source: &'static str,
    },

    /// One native type was registered under two names.
    #[error("native type `{rust_type}` registered as both `{first_name}` and `{second_name}`")]
    DuplicateNativeType {
        /// The Rust path of the native type.
        rust_type: &'static str,
        /// The first registered name.
        first_name: &'static str,
        /// The second registered name.
        second_name: &'static str,
    },

    /// Two fields of one message share a camelCase wire name, so the
    /// `CamelCase` policy could not tell them apart on decode.
    #[error("message type `{type_name}` fields `{first_field}` and `{second_field}` share a camelCase name")]
    AmbiguousFieldName {
        /// The message type declaring the fields.
        type_name: &'static str,
        /// The field that claimed the wire name first.
        first_field: &'static str,
        /// The field whose wire name collides with it.
        second_field: &'static str,
    },
}

fn check_field_names(descriptor: &MessageDescriptor) -> Result<(), RegistryError> {
    let mut wire_names: HashMap<String, &'static str> = HashMap::new();
    for &field in descriptor.fields() {
        if let Some(first_field) = wire_names.insert(snake_to_camel(field), field) {
            return Err(RegistryError::AmbiguousFieldName {
                type_name: descriptor.type_name(),
                first_field,
                second_field: field,
            });
        }
    }
    Ok(())
}

#[derive(Debug)]
struct Registered {
    descriptor: MessageDescriptor,
    source: &'static str,
}

/// Immutable index of message descriptors by name and by native type.
#[derive(Debug)]
pub struct TypeRegistry {
    by_name: HashMap<&'static str, Registered>,
    by_type: HashMap<TypeId, &'static str>,
}

impl TypeRegistry {
    /// Builds the registry by scanning every source in order.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if two descriptors collide on the same type
    /// name or the same native type, or if a message declares two fields
    /// with the same camelCase wire name.
    pub fn build(sources: &[&dyn MessageSource]) -> Result<Self, RegistryError> {
        let mut by_name: HashMap<&'static str, Registered> = HashMap::new();
        let mut by_type: HashMap<TypeId, &'static str> = HashMap::new();

        for source in sources {
            for descriptor in source.descriptors() {
                check_field_names(&descriptor)?;
                match by_name.entry(descriptor.type_name()) {
                    Entry::Occupied(existing) => {
                        return Err(RegistryError::DuplicateTypeName {
                            type_name: descriptor.type_name(),
                            first_source: existing.get().source,
                            second_source: source.name(),
                        });
                    }
                    Entry::Vacant(slot) => {
                        if let Some(&first_name) = by_type.get(&descriptor.type_id()) {
                            return Err(RegistryError::DuplicateNativeType {
                                rust_type: descriptor.rust_type(),
                                first_name,
                                second_name: descriptor.type_name(),
                            });
                        }
                        by_type.insert(descriptor.type_id(), descriptor.type_name());
                        slot.insert(Registered {
                            descriptor,
                            source: source.name(),
                        });
                    }
                }
            }
            debug!(source = source.name(), "registered message source");
        }

        Ok(Self { by_name, by_type })
    }

    /// Looks up a descriptor by its type name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&MessageDescriptor> {
        self.by_name.get(name).map(|registered| &registered.descriptor)
    }

    /// Looks up the descriptor registered for the native type `T`.
    #[must_use]
    pub fn find_by_type<T: Message>(&self) -> Option<&MessageDescriptor> {
        self.find_by_type_id(TypeId::of::<T>())
    }

    /// Looks up the descriptor registered for a native type id.
    #[must_use]
    pub fn find_by_type_id(&self, type_id: TypeId) -> Option<&MessageDescriptor> {
        self.by_type
            .get(&type_id)
            .and_then(|name| self.find_by_name(name))
    }

    /// Number of registered message types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered type names in lexical order.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

//! Decoding documents into mapped objects.
//!
//! [`decode_field`] is the dispatcher: it looks a field up by its storage key
//! and routes it to one of the seven decoder variants by classification.
//! Embedded types re-enter it through their own mapping, so it is the only
//! recursion point for nested documents.

pub mod custom;
pub mod embedded;
pub mod identity;
pub mod property;
pub mod reference;

use crate::descriptor::{Classification, ContainerShape, FieldDescriptor, Mapped, TypeMapping};
use crate::document::value::raw_kind;
use crate::document::{Document, FieldValue};
use crate::error::{ConvertError, MapperError, MapperResult};
use log::debug;
use serde_json::Value;
use std::any::Any;

/// Output of one field decoder.
pub enum Decoded {
    /// Nothing stored; the field keeps its default
    Absent,
    Value(FieldValue),
    /// A custom codec's output, already of the field's type
    Custom(Box<dyn Any + Send>),
}

/// Decodes one field of `document` as described by `descriptor`.
///
/// A missing or null value is [`Decoded::Absent`], never an error.
pub fn decode_field(descriptor: &FieldDescriptor, document: &Document) -> MapperResult<Decoded> {
    if descriptor.is_ignored() {
        return Ok(Decoded::Absent);
    }
    let raw = match document.get(&descriptor.key) {
        None | Some(Value::Null) => return Ok(Decoded::Absent),
        Some(raw) => raw,
    };

    match descriptor.classification {
        Classification::Id => identity::decode(descriptor, raw).map(Decoded::Value),
        Classification::Property => property::decode(descriptor, raw).map(Decoded::Value),
        Classification::Embed => embedded::decode_object(descriptor, raw).map(Decoded::Value),
        Classification::EmbedCollection => {
            embedded::decode_collection(descriptor, raw).map(Decoded::Value)
        }
        Classification::Ref => reference::decode_single(descriptor, raw).map(Decoded::Value),
        Classification::RefCollection => {
            reference::decode_collection(descriptor, raw).map(Decoded::Value)
        }
        Classification::CustomCodec => custom::decode(descriptor, raw).map(Decoded::Custom),
        Classification::Ignored => Ok(Decoded::Absent),
    }
}

/// Attributes a conversion failure to the field it happened in.
pub(crate) fn field_error(descriptor: &FieldDescriptor, source: ConvertError) -> MapperError {
    match descriptor.classification {
        Classification::Id => MapperError::IdentityConversion {
            field: descriptor.name.to_string(),
            source,
        },
        _ => MapperError::TypeMismatch {
            field: descriptor.name.to_string(),
            source,
        },
    }
}

impl<T: Mapped> TypeMapping<T> {
    /// Builds a new `T` from `document`. Fields that are absent keep the
    /// value from `T::default()`.
    pub fn decode(&self, document: &Document) -> MapperResult<T> {
        let mut object = T::default();
        for field in self.fields() {
            let descriptor = field.descriptor();
            match decode_field(descriptor, document)? {
                Decoded::Absent => {}
                Decoded::Value(value) => field
                    .slot()
                    .write(&mut object, value)
                    .map_err(|source| field_error(descriptor, source))?,
                Decoded::Custom(value) => field.slot().write_boxed(&mut object, value).map_err(|e| {
                    MapperError::CodecConstruction {
                        field: descriptor.name.to_string(),
                        reason: e.to_string(),
                    }
                })?,
            }
        }
        Ok(object)
    }
}

/// Decodes one document. Reference fields hold unresolved placeholders.
pub fn decode<T: Mapped>(document: &Document) -> MapperResult<T> {
    TypeMapping::<T>::get()?.decode(document)
}

/// Decodes a batch, failing on the first document that does not decode.
pub fn decode_batch<T: Mapped>(documents: &[Document]) -> MapperResult<Vec<T>> {
    let mapping = TypeMapping::<T>::get()?;
    debug!("Decoding {} documents as {}", documents.len(), mapping.type_name());
    documents.iter().map(|document| mapping.decode(document)).collect()
}

/// Walks a raw value along a declared container shape, converting each leaf
/// with `leaf`. Shared by the property, embedded and reference decoders.
pub(crate) fn walk_shape<F>(descriptor: &FieldDescriptor, raw: &Value, leaf: &mut F) -> MapperResult<FieldValue>
where
    F: FnMut(&Value) -> MapperResult<FieldValue>,
{
    match descriptor.shape {
        ContainerShape::Scalar => leaf(raw),
        ContainerShape::Sequence => walk_sequence(descriptor, raw, leaf),
        ContainerShape::KeyedMap | ContainerShape::KeyedMapOfSequence => {
            let entries = match raw {
                Value::Object(map) => map,
                other => return Err(field_error(descriptor, ConvertError::mismatch("map", raw_kind(other)))),
            };
            let mut values = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let value = match descriptor.shape {
                    ContainerShape::KeyedMapOfSequence => walk_sequence(descriptor, value, leaf)?,
                    _ => leaf(value)?,
                };
                values.push((key.clone(), value));
            }
            Ok(FieldValue::Map(values))
        }
    }
}

fn walk_sequence<F>(descriptor: &FieldDescriptor, raw: &Value, leaf: &mut F) -> MapperResult<FieldValue>
where
    F: FnMut(&Value) -> MapperResult<FieldValue>,
{
    match raw {
        Value::Array(items) => Ok(FieldValue::Seq(
            items.iter().map(|item| leaf(item)).collect::<MapperResult<Vec<_>>>()?,
        )),
        other => Err(field_error(descriptor, ConvertError::mismatch("sequence", raw_kind(other)))),
    }
}

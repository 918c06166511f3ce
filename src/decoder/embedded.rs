//! Embedded-object and embedded-collection decoders.
//!
//! Nested documents are decoded through the nested type's own mapping, which
//! dispatches each of its fields again. Errors raised inside carry the path
//! from this field down (`contact.address.city`).

use super::{field_error, walk_shape};
use crate::descriptor::{FieldDescriptor, TypeRef};
use crate::document::value::raw_kind;
use crate::document::FieldValue;
use crate::error::{ConvertError, MapperError, MapperResult};
use serde_json::Value;

pub fn decode_object(descriptor: &FieldDescriptor, raw: &Value) -> MapperResult<FieldValue> {
    let nested = nested_type(descriptor)?;
    decode_nested(descriptor, &nested, raw)
}

/// Sequences, keyed maps and keyed maps of sequences of embedded documents.
/// Order and keys follow the stored document.
pub fn decode_collection(descriptor: &FieldDescriptor, raw: &Value) -> MapperResult<FieldValue> {
    let nested = nested_type(descriptor)?;
    walk_shape(descriptor, raw, &mut |item| decode_nested(descriptor, &nested, item))
}

fn decode_nested(descriptor: &FieldDescriptor, nested: &TypeRef, raw: &Value) -> MapperResult<FieldValue> {
    match raw {
        Value::Object(document) => nested
            .decode(document)
            .map(FieldValue::Object)
            .map_err(|e| e.within(descriptor.name)),
        Value::Null => Ok(FieldValue::Null),
        other => Err(field_error(descriptor, ConvertError::mismatch("document", raw_kind(other)))),
    }
}

fn nested_type(descriptor: &FieldDescriptor) -> MapperResult<TypeRef> {
    descriptor.nested_type.ok_or_else(|| {
        MapperError::Internal(format!("embedded field {} has no nested type", descriptor.name))
    })
}

//! Identity decoder.
//!
//! Reads the stored identifier in whichever native form it has (object id,
//! string or integer). Coercion into the declared id type happens when the
//! value is written to the field, and a failure there is reported as an
//! identity conversion error.

use super::field_error;
use crate::descriptor::FieldDescriptor;
use crate::document::value::raw_kind;
use crate::document::{FieldValue, ObjectId};
use crate::error::{ConvertError, MapperResult};
use serde_json::Value;

pub fn decode(descriptor: &FieldDescriptor, raw: &Value) -> MapperResult<FieldValue> {
    match raw {
        Value::String(s) => Ok(FieldValue::String(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Int)
            .or_else(|| n.as_u64().map(FieldValue::UInt))
            .ok_or_else(|| field_error(descriptor, ConvertError::parse(n.to_string(), "integer id"))),
        Value::Object(_) => ObjectId::from_value(raw)
            .map(FieldValue::ObjectId)
            .ok_or_else(|| field_error(descriptor, ConvertError::mismatch("identifier", "document"))),
        other => Err(field_error(descriptor, ConvertError::mismatch("identifier", raw_kind(other)))),
    }
}

//! Custom codec adapter.

use crate::descriptor::FieldDescriptor;
use crate::error::{MapperError, MapperResult};
use serde_json::Value;
use std::any::Any;

/// Constructs the field's codec from the descriptor and the raw value and
/// returns its output.
pub fn decode(descriptor: &FieldDescriptor, raw: &Value) -> MapperResult<Box<dyn Any + Send>> {
    let codec = descriptor.codec.ok_or_else(|| MapperError::CodecConstruction {
        field: descriptor.name.to_string(),
        reason: "no codec attached".to_string(),
    })?;
    codec
        .decode(descriptor, raw)
        .map_err(|e| MapperError::CodecConstruction {
            field: descriptor.name.to_string(),
            reason: format!("{}: {}", codec.name, e),
        })
}

//! Property decoder: scalars and simple containers of scalars.

use super::{field_error, walk_shape};
use crate::descriptor::FieldDescriptor;
use crate::document::FieldValue;
use crate::error::MapperResult;
use serde_json::Value;

pub fn decode(descriptor: &FieldDescriptor, raw: &Value) -> MapperResult<FieldValue> {
    if descriptor.passthrough {
        return walk_shape(descriptor, raw, &mut |leaf| Ok(FieldValue::Json(leaf.clone())));
    }
    walk_shape(descriptor, raw, &mut |leaf| {
        FieldValue::from_scalar(leaf).map_err(|source| field_error(descriptor, source))
    })
}

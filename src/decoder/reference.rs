//! Single-reference and reference-collection decoders.
//!
//! Each stored reference becomes an unresolved placeholder carrying the
//! target collection and the foreign id. A reference may be stored as a
//! plain id or as a `{"$ref": collection, "$id": id}` pair; the pair's
//! collection takes precedence over the declared one.

use super::{field_error, walk_shape};
use crate::descriptor::FieldDescriptor;
use crate::document::value::raw_kind;
use crate::document::{FieldValue, RefId, DBREF_COLLECTION_KEY, DBREF_ID_KEY};
use crate::error::{ConvertError, MapperError, MapperResult};
use crate::reference::RefKey;
use serde_json::Value;

pub fn decode_single(descriptor: &FieldDescriptor, raw: &Value) -> MapperResult<FieldValue> {
    let collection = target_collection(descriptor)?;
    placeholder(descriptor, collection, raw)
}

pub fn decode_collection(descriptor: &FieldDescriptor, raw: &Value) -> MapperResult<FieldValue> {
    let collection = target_collection(descriptor)?;
    walk_shape(descriptor, raw, &mut |item| placeholder(descriptor, collection, item))
}

fn placeholder(descriptor: &FieldDescriptor, collection: &str, raw: &Value) -> MapperResult<FieldValue> {
    let (collection, id_value) = match raw {
        Value::Null => return Ok(FieldValue::Null),
        Value::Object(map) => match map.get(DBREF_ID_KEY) {
            Some(id) => (
                map.get(DBREF_COLLECTION_KEY)
                    .and_then(Value::as_str)
                    .unwrap_or(collection),
                id,
            ),
            None => (collection, raw),
        },
        _ => (collection, raw),
    };

    let id = RefId::from_value(id_value).ok_or_else(|| {
        field_error(descriptor, ConvertError::mismatch("reference id", raw_kind(id_value)))
    })?;
    Ok(FieldValue::Ref(RefKey::new(collection, id)))
}

fn target_collection(descriptor: &FieldDescriptor) -> MapperResult<&str> {
    descriptor.target_collection.as_deref().ok_or_else(|| {
        MapperError::Internal(format!("reference field {} has no target collection", descriptor.name))
    })
}

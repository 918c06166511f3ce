//! Encoding mapped objects into documents.
//!
//! The inverse of the decoder, dispatched on the same classifications.
//! References encode as their plain ids whatever their resolution state,
//! unless they point outside the declared collection, in which case they
//! keep the `{"$ref", "$id"}` pair they were read from. `None` or empty
//! values are left out of the document.

use crate::decoder::field_error;
use crate::descriptor::{Classification, FieldDescriptor, Mapped, TypeMapping};
use crate::descriptor::mapping::Slot;
use crate::document::{Document, FieldValue, DBREF_COLLECTION_KEY, DBREF_ID_KEY};
use crate::error::{MapperError, MapperResult};
use serde_json::{json, Value};

impl<T: Mapped> TypeMapping<T> {
    /// Encodes `object` into a new document, fields in declaration order.
    pub fn encode(&self, object: &T) -> MapperResult<Document> {
        let mut document = Document::new();
        for field in self.fields() {
            let descriptor = field.descriptor();
            if let Some(value) = encode_field(descriptor, field.slot(), object)? {
                document.insert(descriptor.key.clone(), value);
            }
        }
        Ok(document)
    }
}

fn encode_field<T>(descriptor: &FieldDescriptor, slot: &dyn Slot<T>, object: &T) -> MapperResult<Option<Value>> {
    match descriptor.classification {
        Classification::Ignored => Ok(None),
        Classification::CustomCodec => {
            let codec = descriptor.codec.ok_or_else(|| MapperError::CodecConstruction {
                field: descriptor.name.to_string(),
                reason: "no codec attached".to_string(),
            })?;
            let value = codec
                .encode(descriptor, slot.read_any(object))
                .map_err(|e| MapperError::CodecConstruction {
                    field: descriptor.name.to_string(),
                    reason: format!("{}: {}", codec.name, e),
                })?;
            Ok(Some(value).filter(|v| !v.is_null()))
        }
        Classification::Id => match slot.read(object)? {
            FieldValue::Null => Ok(None),
            FieldValue::String(s) if s.is_empty() => Ok(None),
            value => to_json(descriptor, value).map(Some),
        },
        Classification::Property | Classification::Embed | Classification::EmbedCollection => {
            match slot.read(object).map_err(|e| e.within(descriptor.name))? {
                FieldValue::Null => Ok(None),
                value => to_json(descriptor, value).map(Some),
            }
        }
        Classification::Ref | Classification::RefCollection => {
            match slot.read(object).map_err(|e| e.within(descriptor.name))? {
                FieldValue::Null => Ok(None),
                value => {
                    let declared = descriptor.target_collection.as_deref();
                    to_json(descriptor, pair_foreign_refs(value, declared)).map(Some)
                }
            }
        }
    }
}

/// Turns references whose collection differs from `declared` into
/// `{"$ref": collection, "$id": id}` pairs. Plain ids are left as they are.
fn pair_foreign_refs(value: FieldValue, declared: Option<&str>) -> FieldValue {
    match value {
        FieldValue::Ref(key) if declared != Some(key.collection.as_str()) => FieldValue::Json(json!({
            DBREF_COLLECTION_KEY: key.collection,
            DBREF_ID_KEY: key.id.to_value()
        })),
        FieldValue::Seq(items) => FieldValue::Seq(
            items
                .into_iter()
                .map(|item| pair_foreign_refs(item, declared))
                .collect(),
        ),
        FieldValue::Map(entries) => FieldValue::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, pair_foreign_refs(value, declared)))
                .collect(),
        ),
        other => other,
    }
}

fn to_json(descriptor: &FieldDescriptor, value: FieldValue) -> MapperResult<Value> {
    value.into_json().map_err(|source| field_error(descriptor, source))
}

/// Encodes one object into a document.
pub fn encode<T: Mapped>(object: &T) -> MapperResult<Document> {
    TypeMapping::<T>::get()?.encode(object)
}

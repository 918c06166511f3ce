use super::{Document, ObjectId, DATE_KEY};
use crate::error::ConvertError;
use crate::reference::RefKey;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Number, Value};
use std::any::Any;
use std::fmt;

/// Intermediate value between a raw document value and a typed field.
///
/// Decoders turn raw values into `FieldValue`s and field types convert them
/// into their own representation; encoding runs the other way. `Object` only
/// appears while decoding (a constructed embedded instance) and `Document`
/// only while encoding (an encoded embedded instance).
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned values above `i64::MAX`, or any value of an unsigned field
    UInt(u64),
    Double(f64),
    String(String),
    ObjectId(ObjectId),
    DateTime(DateTime<Utc>),
    /// Untyped passthrough for `serde_json::Value` fields
    Json(Value),
    Seq(Vec<FieldValue>),
    Map(Vec<(String, FieldValue)>),
    Document(Document),
    Object(Box<dyn Any + Send>),
    Ref(RefKey),
}

impl FieldValue {
    /// Converts a leaf value. Arrays and plain documents are rejected; the
    /// caller walks containers itself so it can check them against the
    /// declared shape.
    pub fn from_scalar(raw: &Value) -> Result<Self, ConvertError> {
        match raw {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Number(n) => Ok(number_value(n)),
            Value::String(s) => Ok(FieldValue::String(s.clone())),
            Value::Array(_) => Err(ConvertError::mismatch("scalar", "sequence")),
            Value::Object(_) => {
                if let Some(oid) = ObjectId::from_value(raw) {
                    Ok(FieldValue::ObjectId(oid))
                } else if let Some(date) = date_from_value(raw) {
                    Ok(FieldValue::DateTime(date))
                } else {
                    Err(ConvertError::mismatch("scalar", "document"))
                }
            }
        }
    }

    /// Converts back into the stored representation.
    pub fn into_json(self) -> Result<Value, ConvertError> {
        Ok(match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Int(i) => Value::from(i),
            FieldValue::UInt(u) => Value::from(u),
            FieldValue::Double(d) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s),
            FieldValue::ObjectId(oid) => oid.to_value(),
            FieldValue::DateTime(dt) => date_to_value(&dt),
            FieldValue::Json(v) => v,
            FieldValue::Seq(items) => Value::Array(
                items
                    .into_iter()
                    .map(FieldValue::into_json)
                    .collect::<Result<_, _>>()?,
            ),
            FieldValue::Map(entries) => {
                let mut map = Document::new();
                for (key, value) in entries {
                    map.insert(key, value.into_json()?);
                }
                Value::Object(map)
            }
            FieldValue::Document(doc) => Value::Object(doc),
            FieldValue::Ref(key) => key.id.to_value(),
            FieldValue::Object(_) => {
                return Err(ConvertError::mismatch("encodable value", "object"))
            }
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) | FieldValue::UInt(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::ObjectId(_) => "ObjectId",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Json(_) => "json",
            FieldValue::Seq(_) => "sequence",
            FieldValue::Map(_) => "map",
            FieldValue::Document(_) => "document",
            FieldValue::Object(_) => "object",
            FieldValue::Ref(_) => "reference",
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("Null"),
            FieldValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            FieldValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            FieldValue::UInt(u) => f.debug_tuple("UInt").field(u).finish(),
            FieldValue::Double(d) => f.debug_tuple("Double").field(d).finish(),
            FieldValue::String(s) => f.debug_tuple("String").field(s).finish(),
            FieldValue::ObjectId(oid) => f.debug_tuple("ObjectId").field(oid).finish(),
            FieldValue::DateTime(dt) => f.debug_tuple("DateTime").field(dt).finish(),
            FieldValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            FieldValue::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            FieldValue::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            FieldValue::Document(doc) => f.debug_tuple("Document").field(doc).finish(),
            FieldValue::Object(_) => f.write_str("Object(..)"),
            FieldValue::Ref(key) => f.debug_tuple("Ref").field(key).finish(),
        }
    }
}

/// Short name of a raw value's JSON type, used in error messages.
pub fn raw_kind(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "document",
    }
}

fn number_value(n: &Number) -> FieldValue {
    if let Some(i) = n.as_i64() {
        FieldValue::Int(i)
    } else if let Some(u) = n.as_u64() {
        FieldValue::UInt(u)
    } else {
        FieldValue::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Reads `{"$date": <rfc3339 string | epoch millis>}`.
pub fn date_from_value(raw: &Value) -> Option<DateTime<Utc>> {
    let map = raw.as_object()?;
    if map.len() != 1 {
        return None;
    }
    match map.get(DATE_KEY)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

pub fn date_to_value(dt: &DateTime<Utc>) -> Value {
    json!({ DATE_KEY: dt.to_rfc3339() })
}

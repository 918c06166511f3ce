//! Source document model.
//!
//! Documents are ordered maps of string keys to dynamic JSON values. Values
//! native to the store use the extended JSON convention: `{"$oid": ..}` for
//! object ids, `{"$date": ..}` for timestamps and `{"$ref": .., "$id": ..}`
//! for database references.

pub mod object_id;
pub mod value;

pub use object_id::ObjectId;
pub use value::FieldValue;

use serde_json::Value;
use std::fmt;

/// An ordered key/value document as read from or written to the store.
pub type Document = serde_json::Map<String, Value>;

/// Key under which every document stores its identifier.
pub const ID_KEY: &str = "_id";

/// Extended JSON key marking a timestamp.
pub const DATE_KEY: &str = "$date";

/// Extended JSON keys of a database reference.
pub const DBREF_COLLECTION_KEY: &str = "$ref";
pub const DBREF_ID_KEY: &str = "$id";

/// A foreign identifier as carried by reference placeholders and used to key
/// batched lookups.
///
/// Hex strings that parse as object ids are canonicalised to
/// [`RefId::ObjectId`], so a reference stored as a plain string matches a
/// document whose `_id` is stored natively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefId {
    ObjectId(ObjectId),
    String(String),
    Int(i64),
}

impl RefId {
    /// Reads an id from its stored form. Returns `None` for values that
    /// cannot act as identifiers (null, bools, floats, arrays, documents).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::from(s.as_str())),
            Value::Number(n) => n.as_i64().map(RefId::Int),
            Value::Object(_) => ObjectId::from_value(value).map(RefId::ObjectId),
            _ => None,
        }
    }

    /// Stored form of the id.
    pub fn to_value(&self) -> Value {
        match self {
            RefId::ObjectId(oid) => oid.to_value(),
            RefId::String(s) => Value::String(s.clone()),
            RefId::Int(i) => Value::from(*i),
        }
    }

    /// Type-tagged key used by key/value stores, so `"42"` and `42` never
    /// collide.
    pub fn storage_key(&self) -> String {
        match self {
            RefId::ObjectId(oid) => format!("o:{}", oid),
            RefId::String(s) => format!("s:{}", s),
            RefId::Int(i) => format!("i:{}", i),
        }
    }
}

impl From<&str> for RefId {
    fn from(s: &str) -> Self {
        match ObjectId::parse_str(s) {
            Ok(oid) => RefId::ObjectId(oid),
            Err(_) => RefId::String(s.to_string()),
        }
    }
}

impl From<String> for RefId {
    fn from(s: String) -> Self {
        match ObjectId::parse_str(&s) {
            Ok(oid) => RefId::ObjectId(oid),
            Err(_) => RefId::String(s),
        }
    }
}

impl From<ObjectId> for RefId {
    fn from(oid: ObjectId) -> Self {
        RefId::ObjectId(oid)
    }
}

impl From<i64> for RefId {
    fn from(i: i64) -> Self {
        RefId::Int(i)
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefId::ObjectId(oid) => write!(f, "{}", oid),
            RefId::String(s) => f.write_str(s),
            RefId::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Reads the identifier of a stored document.
pub fn document_id(document: &Document) -> Option<RefId> {
    document.get(ID_KEY).and_then(RefId::from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ref_id_canonicalises_hex_strings() {
        let hex = "507f191e810c19729de860ea";
        let from_string = RefId::from_value(&json!(hex)).unwrap();
        let from_oid = RefId::from_value(&json!({"$oid": hex})).unwrap();
        assert_eq!(from_string, from_oid);
        assert!(matches!(from_string, RefId::ObjectId(_)));
    }

    #[test]
    fn test_ref_id_rejects_non_ids() {
        assert_eq!(RefId::from_value(&json!(null)), None);
        assert_eq!(RefId::from_value(&json!(true)), None);
        assert_eq!(RefId::from_value(&json!(1.5)), None);
        assert_eq!(RefId::from_value(&json!([1])), None);
        assert_eq!(RefId::from_value(&json!({"name": "x"})), None);
    }

    #[test]
    fn test_storage_keys_are_type_tagged() {
        assert_eq!(RefId::from("42").storage_key(), "s:42");
        assert_eq!(RefId::Int(42).storage_key(), "i:42");
    }

    #[test]
    fn test_document_id() {
        let doc = json!({"_id": 7, "name": "x"});
        assert_eq!(document_id(doc.as_object().unwrap()), Some(RefId::Int(7)));
        let doc = json!({"name": "x"});
        assert_eq!(document_id(doc.as_object().unwrap()), None);
    }
}

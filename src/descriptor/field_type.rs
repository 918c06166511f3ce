//! Static facts about the Rust types fields are declared with, and the
//! conversions between those types and [`FieldValue`].

use super::field::ContainerShape;
use super::mapping::{Entity, Mapped, TypeMapping};
use crate::document::{Document, FieldValue, ObjectId};
use crate::error::{ConvertError, MapperResult};
use crate::reference::{PathSegment, PendingRef, Reference, Resolution};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// What sits at the leaves of a field's container shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementKind {
    Primitive,
    Json,
    Embedded(TypeRef),
    Reference(TargetRef),
}

impl ElementKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ElementKind::Primitive => "primitive",
            ElementKind::Json => "json",
            ElementKind::Embedded(_) => "embedded",
            ElementKind::Reference(_) => "reference",
        }
    }
}

/// Handle to a mapped type that can be instantiated from a document without
/// naming the type statically.
#[derive(Clone, Copy)]
pub struct TypeRef {
    pub type_id: TypeId,
    pub name: &'static str,
    decode: fn(&Document) -> MapperResult<Box<dyn Any + Send>>,
}

impl TypeRef {
    pub fn of<M: Mapped>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: type_name::<M>(),
            decode: decode_erased::<M>,
        }
    }

    /// Builds a new instance from `document` through the type's own
    /// descriptors.
    pub fn decode(&self, document: &Document) -> MapperResult<Box<dyn Any + Send>> {
        (self.decode)(document)
    }
}

fn decode_erased<M: Mapped>(document: &Document) -> MapperResult<Box<dyn Any + Send>> {
    let object: M = TypeMapping::<M>::get()?.decode(document)?;
    Ok(Box::new(object))
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name).finish()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// The entity a reference points at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRef {
    pub collection: &'static str,
    pub type_name: &'static str,
}

/// Everything descriptor derivation needs to know about a field's type.
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub value_type: TypeId,
    pub value_type_name: &'static str,
    pub shape: ContainerShape,
    /// `None` for types that can only go through a custom codec
    pub element: Option<ElementKind>,
}

impl SlotInfo {
    pub fn of<F: FieldType>() -> Self {
        Self {
            value_type: TypeId::of::<F>(),
            value_type_name: type_name::<F>(),
            shape: F::shape(),
            element: Some(F::element()),
        }
    }

    pub fn opaque<F: Any>() -> Self {
        Self {
            value_type: TypeId::of::<F>(),
            value_type_name: type_name::<F>(),
            shape: ContainerShape::Scalar,
            element: None,
        }
    }
}

/// A Rust type that can be declared as a mapped field.
///
/// Implemented for primitives, strings, [`ObjectId`], timestamps,
/// `serde_json::Value`, every [`Mapped`] type (embedded), [`Reference`]s,
/// and `Option`, `Vec`, `HashMap<String, _>` and `BTreeMap<String, _>` of
/// those.
///
/// A null element inside a stored sequence or keyed map is an absent value.
/// Containers whose element type cannot hold null leave it out; declare the
/// element as `Option<_>` to keep its position.
pub trait FieldType: Sized + Send + Sync + 'static {
    fn shape() -> ContainerShape {
        ContainerShape::Scalar
    }

    /// Whether a stored null converts into a value of this type.
    fn nullable() -> bool {
        false
    }

    fn element() -> ElementKind {
        ElementKind::Primitive
    }

    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError>;

    fn to_field_value(&self) -> MapperResult<FieldValue>;

    /// Appends every reference placeholder needing a lookup. Resolved and
    /// Missing entries are skipped unless `refresh` is set.
    fn collect_refs(&self, _path: &mut Vec<PathSegment>, _refresh: bool, _out: &mut Vec<PendingRef>) {}

    /// Writes a lookup outcome at `path`. Returns `Ok(false)` when the path
    /// does not lead to a reference.
    fn fill_ref(&mut self, _path: &[PathSegment], _resolution: Resolution<'_>) -> MapperResult<bool> {
        Ok(false)
    }
}

macro_rules! impl_integer_field {
    ($variant:ident as $wide:ty: $($t:ty),*) => {
        $(
            impl FieldType for $t {
                fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
                    match value {
                        FieldValue::Int(i) => Ok(i as $t),
                        FieldValue::UInt(u) => Ok(u as $t),
                        // `as` truncates toward zero
                        FieldValue::Double(d) => Ok(d as $t),
                        FieldValue::String(s) => s
                            .trim()
                            .parse::<$t>()
                            .map_err(|_| ConvertError::parse(s, stringify!($t))),
                        other => Err(ConvertError::mismatch(stringify!($t), other.kind())),
                    }
                }

                fn to_field_value(&self) -> MapperResult<FieldValue> {
                    Ok(FieldValue::$variant(*self as $wide))
                }
            }
        )*
    };
}

impl_integer_field!(Int as i64: i8, i16, i32, i64, isize);
impl_integer_field!(UInt as u64: u8, u16, u32, u64, usize);

macro_rules! impl_float_field {
    ($($t:ty),*) => {
        $(
            impl FieldType for $t {
                fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
                    match value {
                        FieldValue::Int(i) => Ok(i as $t),
                        FieldValue::UInt(u) => Ok(u as $t),
                        FieldValue::Double(d) => Ok(d as $t),
                        other => Err(ConvertError::mismatch(stringify!($t), other.kind())),
                    }
                }

                fn to_field_value(&self) -> MapperResult<FieldValue> {
                    Ok(FieldValue::Double(f64::from(*self)))
                }
            }
        )*
    };
}

impl_float_field!(f32, f64);

impl FieldType for bool {
    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            FieldValue::Int(i) => Ok(i != 0),
            FieldValue::UInt(u) => Ok(u != 0),
            other => Err(ConvertError::mismatch("bool", other.kind())),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        Ok(FieldValue::Bool(*self))
    }
}

impl FieldType for String {
    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::String(s) => Ok(s),
            FieldValue::ObjectId(oid) => Ok(oid.to_hex()),
            FieldValue::Int(i) => Ok(i.to_string()),
            FieldValue::UInt(u) => Ok(u.to_string()),
            other => Err(ConvertError::mismatch("string", other.kind())),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        Ok(FieldValue::String(self.clone()))
    }
}

impl FieldType for ObjectId {
    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::ObjectId(oid) => Ok(oid),
            FieldValue::String(s) => ObjectId::parse_str(&s),
            other => Err(ConvertError::mismatch("ObjectId", other.kind())),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        Ok(FieldValue::ObjectId(*self))
    }
}

impl FieldType for DateTime<Utc> {
    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::DateTime(dt) => Ok(dt),
            FieldValue::Int(millis) => Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| ConvertError::parse(millis.to_string(), "DateTime")),
            FieldValue::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ConvertError::parse(s, "DateTime")),
            other => Err(ConvertError::mismatch("DateTime", other.kind())),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        Ok(FieldValue::DateTime(*self))
    }
}

impl FieldType for Value {
    fn element() -> ElementKind {
        ElementKind::Json
    }

    fn nullable() -> bool {
        true
    }

    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::Json(v) => Ok(v),
            other => other.into_json(),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        Ok(FieldValue::Json(self.clone()))
    }
}

impl<M: Mapped> FieldType for M {
    fn element() -> ElementKind {
        ElementKind::Embedded(TypeRef::of::<M>())
    }

    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::Object(object) => object
                .downcast::<M>()
                .map(|boxed| *boxed)
                .map_err(|_| ConvertError::mismatch(type_name::<M>(), "object of another type")),
            other => Err(ConvertError::mismatch(type_name::<M>(), other.kind())),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        let document = TypeMapping::<M>::get()?.encode(self)?;
        Ok(FieldValue::Document(document))
    }

    fn collect_refs(&self, path: &mut Vec<PathSegment>, refresh: bool, out: &mut Vec<PendingRef>) {
        let mapping = match TypeMapping::<M>::get() {
            Ok(mapping) => mapping,
            Err(_) => return,
        };
        for field in mapping.cascading_fields() {
            path.push(PathSegment::Field(field.descriptor().name));
            field.slot().collect_refs(self, path, refresh, out);
            path.pop();
        }
    }

    fn fill_ref(&mut self, path: &[PathSegment], resolution: Resolution<'_>) -> MapperResult<bool> {
        let (name, rest) = match path.split_first() {
            Some((PathSegment::Field(name), rest)) => (*name, rest),
            _ => return Ok(false),
        };
        let mapping = TypeMapping::<M>::get()?;
        match mapping.field(name) {
            Some(field) => field
                .slot()
                .fill_ref(self, rest, resolution)
                .map_err(|e| e.within(name)),
            None => Ok(false),
        }
    }
}

impl<E: Entity> FieldType for Reference<E> {
    fn element() -> ElementKind {
        ElementKind::Reference(TargetRef {
            collection: E::COLLECTION,
            type_name: type_name::<E>(),
        })
    }

    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::Ref(key) => Ok(Reference::Unresolved(key)),
            other => Err(ConvertError::mismatch("reference", other.kind())),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        Ok(FieldValue::Ref(self.key().clone()))
    }

    fn collect_refs(&self, path: &mut Vec<PathSegment>, refresh: bool, out: &mut Vec<PendingRef>) {
        if refresh || self.is_unresolved() {
            out.push(PendingRef {
                path: path.clone(),
                key: self.key().clone(),
            });
        }
    }

    fn fill_ref(&mut self, path: &[PathSegment], resolution: Resolution<'_>) -> MapperResult<bool> {
        if !path.is_empty() {
            return Ok(false);
        }
        let key = self.key().clone();
        *self = match resolution {
            Resolution::Found(document) => {
                let target: E = TypeMapping::<E>::get()?.decode(document)?;
                Reference::Resolved(key, Box::new(target))
            }
            Resolution::Missing => Reference::Missing(key),
        };
        Ok(true)
    }
}

impl<V: FieldType> FieldType for Option<V> {
    fn shape() -> ContainerShape {
        V::shape()
    }

    fn element() -> ElementKind {
        V::element()
    }

    fn nullable() -> bool {
        true
    }

    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::Null => Ok(None),
            other => V::from_field_value(other).map(Some),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        match self {
            Some(value) => value.to_field_value(),
            None => Ok(FieldValue::Null),
        }
    }

    fn collect_refs(&self, path: &mut Vec<PathSegment>, refresh: bool, out: &mut Vec<PendingRef>) {
        if let Some(value) = self {
            value.collect_refs(path, refresh, out);
        }
    }

    fn fill_ref(&mut self, path: &[PathSegment], resolution: Resolution<'_>) -> MapperResult<bool> {
        match self {
            Some(value) => value.fill_ref(path, resolution),
            None => Ok(false),
        }
    }
}

impl<V: FieldType> FieldType for Vec<V> {
    fn shape() -> ContainerShape {
        ContainerShape::Sequence
    }

    fn element() -> ElementKind {
        V::element()
    }

    fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
        match value {
            FieldValue::Seq(items) => items
                .into_iter()
                .filter(|item| V::nullable() || !item.is_null())
                .map(V::from_field_value)
                .collect(),
            other => Err(ConvertError::mismatch("sequence", other.kind())),
        }
    }

    fn to_field_value(&self) -> MapperResult<FieldValue> {
        let items = self
            .iter()
            .map(FieldType::to_field_value)
            .collect::<MapperResult<Vec<_>>>()?;
        Ok(FieldValue::Seq(items))
    }

    fn collect_refs(&self, path: &mut Vec<PathSegment>, refresh: bool, out: &mut Vec<PendingRef>) {
        for (index, item) in self.iter().enumerate() {
            path.push(PathSegment::Index(index));
            item.collect_refs(path, refresh, out);
            path.pop();
        }
    }

    fn fill_ref(&mut self, path: &[PathSegment], resolution: Resolution<'_>) -> MapperResult<bool> {
        match path.split_first() {
            Some((PathSegment::Index(index), rest)) => match self.get_mut(*index) {
                Some(item) => item.fill_ref(rest, resolution),
                None => Ok(false),
            },
            _ => Ok(false),
        }
    }
}

macro_rules! impl_keyed_map_field {
    ($($map:ident),*) => {
        $(
            impl<V: FieldType> FieldType for $map<String, V> {
                fn shape() -> ContainerShape {
                    match V::shape() {
                        ContainerShape::Sequence => ContainerShape::KeyedMapOfSequence,
                        _ => ContainerShape::KeyedMap,
                    }
                }

                fn element() -> ElementKind {
                    V::element()
                }

                fn from_field_value(value: FieldValue) -> Result<Self, ConvertError> {
                    match value {
                        FieldValue::Map(entries) => entries
                            .into_iter()
                            .filter(|(_, value)| V::nullable() || !value.is_null())
                            .map(|(key, value)| V::from_field_value(value).map(|v| (key, v)))
                            .collect(),
                        other => Err(ConvertError::mismatch("map", other.kind())),
                    }
                }

                fn to_field_value(&self) -> MapperResult<FieldValue> {
                    let mut entries = self
                        .iter()
                        .map(|(key, value)| Ok((key.clone(), value.to_field_value()?)))
                        .collect::<MapperResult<Vec<_>>>()?;
                    // Stable output regardless of the map's iteration order
                    entries.sort_by(|a, b| a.0.cmp(&b.0));
                    Ok(FieldValue::Map(entries))
                }

                fn collect_refs(&self, path: &mut Vec<PathSegment>, refresh: bool, out: &mut Vec<PendingRef>) {
                    let mut keys: Vec<&String> = self.keys().collect();
                    keys.sort();
                    for key in keys {
                        if let Some(value) = self.get(key) {
                            path.push(PathSegment::Key(key.clone()));
                            value.collect_refs(path, refresh, out);
                            path.pop();
                        }
                    }
                }

                fn fill_ref(&mut self, path: &[PathSegment], resolution: Resolution<'_>) -> MapperResult<bool> {
                    match path.split_first() {
                        Some((PathSegment::Key(key), rest)) => match self.get_mut(key) {
                            Some(value) => value.fill_ref(rest, resolution),
                            None => Ok(false),
                        },
                        _ => Ok(false),
                    }
                }
            }
        )*
    };
}

impl_keyed_map_field!(HashMap, BTreeMap);

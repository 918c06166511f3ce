//! Per-type mapping tables.
//!
//! A mapped type declares its fields once through a [`MappingBuilder`]:
//! name, typed accessors and annotations. The first use of the type derives
//! a [`TypeMapping`] (descriptors plus type-erased field slots), publishes it
//! in a process-wide cache and shares it read-only from then on.

use super::field::{Annotation, Classification, FieldDescriptor};
use super::field_type::{FieldType, SlotInfo};
use crate::document::FieldValue;
use crate::error::{ConvertError, MapperError, MapperResult};
use crate::reference::{PathSegment, PendingRef, Resolution};
use log::debug;
use once_cell::sync::Lazy;
use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

/// A type that can be decoded from and encoded to a document.
///
/// Embedded types implement only this trait; types stored in their own
/// collection (and therefore referenceable) also implement [`Entity`].
pub trait Mapped: Default + Send + Sync + 'static {
    /// Declares the type's fields.
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self>;
}

/// A mapped type stored in its own collection.
pub trait Entity: Mapped {
    const COLLECTION: &'static str;
}

/// Typed access to one field of `T`, with the field's type erased.
pub(crate) trait Slot<T>: Send + Sync {
    fn info(&self) -> SlotInfo;

    fn write(&self, object: &mut T, value: FieldValue) -> Result<(), ConvertError>;

    /// Stores a codec output. Fails when it is not the field's type.
    fn write_boxed(&self, object: &mut T, value: Box<dyn Any + Send>) -> Result<(), ConvertError>;

    fn read(&self, object: &T) -> MapperResult<FieldValue>;

    fn read_any<'a>(&self, object: &'a T) -> &'a dyn Any;

    /// Appends the field's pending placeholders, with paths continuing `path`.
    fn collect_refs(&self, object: &T, path: &mut Vec<PathSegment>, refresh: bool, out: &mut Vec<PendingRef>);

    fn fill_ref(&self, object: &mut T, path: &[PathSegment], resolution: Resolution<'_>) -> MapperResult<bool>;
}

type Getter<T, F> = Box<dyn Fn(&T) -> &F + Send + Sync>;
type GetterMut<T, F> = Box<dyn Fn(&mut T) -> &mut F + Send + Sync>;

struct ValueSlot<T, F> {
    get: Getter<T, F>,
    get_mut: GetterMut<T, F>,
}

impl<T: 'static, F: FieldType> Slot<T> for ValueSlot<T, F> {
    fn info(&self) -> SlotInfo {
        SlotInfo::of::<F>()
    }

    fn write(&self, object: &mut T, value: FieldValue) -> Result<(), ConvertError> {
        *(self.get_mut)(object) = F::from_field_value(value)?;
        Ok(())
    }

    fn write_boxed(&self, object: &mut T, value: Box<dyn Any + Send>) -> Result<(), ConvertError> {
        let value = value
            .downcast::<F>()
            .map_err(|_| ConvertError::mismatch(type_name::<F>(), "codec output of another type"))?;
        *(self.get_mut)(object) = *value;
        Ok(())
    }

    fn read(&self, object: &T) -> MapperResult<FieldValue> {
        (self.get)(object).to_field_value()
    }

    fn read_any<'a>(&self, object: &'a T) -> &'a dyn Any {
        (self.get)(object)
    }

    fn collect_refs(&self, object: &T, path: &mut Vec<PathSegment>, refresh: bool, out: &mut Vec<PendingRef>) {
        (self.get)(object).collect_refs(path, refresh, out);
    }

    fn fill_ref(&self, object: &mut T, path: &[PathSegment], resolution: Resolution<'_>) -> MapperResult<bool> {
        (self.get_mut)(object).fill_ref(path, resolution)
    }
}

/// A field whose type is only reachable through a custom codec.
struct OpaqueSlot<T, F> {
    get: Getter<T, F>,
    get_mut: GetterMut<T, F>,
}

impl<T: 'static, F: Any + Send + Sync> Slot<T> for OpaqueSlot<T, F> {
    fn info(&self) -> SlotInfo {
        SlotInfo::opaque::<F>()
    }

    fn write(&self, _object: &mut T, value: FieldValue) -> Result<(), ConvertError> {
        Err(ConvertError::mismatch("codec output", value.kind()))
    }

    fn write_boxed(&self, object: &mut T, value: Box<dyn Any + Send>) -> Result<(), ConvertError> {
        let value = value
            .downcast::<F>()
            .map_err(|_| ConvertError::mismatch(type_name::<F>(), "codec output of another type"))?;
        *(self.get_mut)(object) = *value;
        Ok(())
    }

    fn read(&self, _object: &T) -> MapperResult<FieldValue> {
        Err(MapperError::Internal(format!(
            "{} fields are only encoded through their codec",
            type_name::<F>()
        )))
    }

    fn read_any<'a>(&self, object: &'a T) -> &'a dyn Any {
        (self.get)(object)
    }

    fn collect_refs(&self, _object: &T, _path: &mut Vec<PathSegment>, _refresh: bool, _out: &mut Vec<PendingRef>) {}

    fn fill_ref(&self, _object: &mut T, _path: &[PathSegment], _resolution: Resolution<'_>) -> MapperResult<bool> {
        Ok(false)
    }
}

struct FieldEntry<T> {
    name: &'static str,
    annotations: Vec<Annotation>,
    slot: Box<dyn Slot<T>>,
}

/// Collects a type's field declarations.
///
/// ```ignore
/// impl Mapped for Order {
///     fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
///         builder
///             .field("id", |o| &o.id, |o| &mut o.id)
///             .with(Annotation::Id)
///             .field("products", |o| &o.products, |o| &mut o.products)
///             .with(Annotation::ref_list())
///     }
/// }
/// ```
pub struct MappingBuilder<T> {
    fields: Vec<FieldEntry<T>>,
    errors: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Mapped> MappingBuilder<T> {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            errors: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares a field of a supported [`FieldType`].
    pub fn field<F, G, S>(mut self, name: &'static str, get: G, get_mut: S) -> Self
    where
        F: FieldType,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        self.fields.push(FieldEntry {
            name,
            annotations: Vec::new(),
            slot: Box::new(ValueSlot {
                get: Box::new(get),
                get_mut: Box::new(get_mut),
            }),
        });
        self
    }

    /// Declares a field of any type; it must carry a codec annotation whose
    /// output is that type.
    pub fn custom_field<F, G, S>(mut self, name: &'static str, get: G, get_mut: S) -> Self
    where
        F: Any + Send + Sync,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        self.fields.push(FieldEntry {
            name,
            annotations: Vec::new(),
            slot: Box::new(OpaqueSlot {
                get: Box::new(get),
                get_mut: Box::new(get_mut),
            }),
        });
        self
    }

    /// Annotates the most recently declared field.
    pub fn with(mut self, annotation: Annotation) -> Self {
        match self.fields.last_mut() {
            Some(entry) => entry.annotations.push(annotation),
            None => self
                .errors
                .push(format!("annotation {:?} declared before any field", annotation)),
        }
        self
    }
}

/// A derived field: its descriptor and its accessor.
pub struct MappedField<T> {
    descriptor: FieldDescriptor,
    slot: Box<dyn Slot<T>>,
}

impl<T> MappedField<T> {
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub(crate) fn slot(&self) -> &dyn Slot<T> {
        self.slot.as_ref()
    }
}

/// The derived, immutable mapping of one type.
pub struct TypeMapping<T> {
    type_name: &'static str,
    fields: Vec<MappedField<T>>,
}

type MappingCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static MAPPINGS: Lazy<MappingCache> = Lazy::new(|| RwLock::new(HashMap::new()));

impl<T: Mapped> TypeMapping<T> {
    /// Returns the published mapping for `T`, deriving it on first use.
    ///
    /// Concurrent first calls may each derive, but only the first result is
    /// published and every caller receives that one.
    pub fn get() -> MapperResult<Arc<Self>> {
        let type_id = TypeId::of::<T>();

        let cached = {
            let mappings = match MAPPINGS.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            mappings.get(&type_id).cloned()
        };
        if let Some(existing) = cached {
            return Self::downcast(existing);
        }

        let derived: Arc<dyn Any + Send + Sync> = Arc::new(Self::derive()?);
        let published = {
            let mut mappings = match MAPPINGS.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            mappings
                .entry(type_id)
                .or_insert_with(|| {
                    debug!("Published field descriptors for {}", type_name::<T>());
                    derived
                })
                .clone()
        };
        Self::downcast(published)
    }

    fn downcast(mapping: Arc<dyn Any + Send + Sync>) -> MapperResult<Arc<Self>> {
        mapping.downcast::<Self>().map_err(|_| {
            MapperError::Internal(format!("mapping cache entry for {} has the wrong type", type_name::<T>()))
        })
    }

    /// Derives the mapping without consulting or populating the cache.
    pub fn derive() -> MapperResult<Self> {
        let type_name = type_name::<T>();
        let builder = T::mapping(MappingBuilder::new());

        if let Some(error) = builder.errors.into_iter().next() {
            return Err(MapperError::Descriptor {
                type_name: type_name.to_string(),
                field: String::new(),
                reason: error,
            });
        }

        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        let mut id_field: Option<&'static str> = None;
        let mut fields = Vec::with_capacity(builder.fields.len());

        for entry in builder.fields {
            let fail = |reason: String| MapperError::Descriptor {
                type_name: type_name.to_string(),
                field: entry.name.to_string(),
                reason,
            };

            if !names.insert(entry.name) {
                return Err(fail("field declared twice".to_string()));
            }

            let descriptor =
                FieldDescriptor::derive(type_name, entry.name, &entry.annotations, &entry.slot.info())?;

            if descriptor.classification == Classification::Id {
                if let Some(existing) = id_field {
                    return Err(fail(format!("{} is already the id field", existing)));
                }
                id_field = Some(entry.name);
            }
            if !descriptor.is_ignored() && !keys.insert(descriptor.key.clone()) {
                return Err(fail(format!("storage key {:?} used twice", descriptor.key)));
            }

            fields.push(MappedField {
                descriptor,
                slot: entry.slot,
            });
        }

        Ok(Self { type_name, fields })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[MappedField<T>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&MappedField<T>> {
        self.fields.iter().find(|field| field.descriptor.name == name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().map(|field| &field.descriptor)
    }

    pub fn id_field(&self) -> Option<&MappedField<T>> {
        self.fields
            .iter()
            .find(|field| field.descriptor.classification == Classification::Id)
    }

    /// Names of every Ref and RefCollection field.
    pub fn reference_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|field| field.descriptor.classification.is_reference())
            .map(|field| field.descriptor.name)
            .collect()
    }

    /// Reference fields plus embedded fields, whose nested objects may hold
    /// references of their own.
    pub fn cascading_fields(&self) -> Vec<&MappedField<T>> {
        self.fields
            .iter()
            .filter(|field| {
                let classification = field.descriptor.classification;
                classification.is_reference() || classification.is_embedded()
            })
            .collect()
    }
}

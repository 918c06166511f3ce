//! Field descriptors and per-type mapping tables.

pub mod field;
pub mod field_type;
pub mod mapping;

pub use field::{winning_annotation, Annotation, Classification, ContainerShape, FieldDescriptor};
pub use field_type::{ElementKind, FieldType, SlotInfo, TargetRef, TypeRef};
pub use mapping::{Entity, Mapped, MappedField, MappingBuilder, TypeMapping};

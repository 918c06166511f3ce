//! # DataFold Mapper
//!
//! Maps statically typed domain objects to and from documents of a
//! schema-flexible document store, driven by per-field metadata declared on
//! each type.
//!
//! ## Core Components
//!
//! * `descriptor` - Field classification, descriptors and per-type mapping tables
//! * `decoder` - The field dispatcher and the seven decoder variants
//! * `encoder` - Objects back into documents
//! * `reference` - Reference placeholders
//! * `cascade` - Batched resolution of reference fields
//! * `codec` - Custom field codecs and their registry
//! * `store` - The store boundary, with in-memory and sled implementations
//! * `config` - Mapper configuration
//! * `error` - Error types and handling
//!
//! ## Architecture
//!
//! Decoding is synchronous and performs no I/O: each field of a document is
//! classified once (Id, Property, Embed, EmbedCollection, Ref,
//! RefCollection, CustomCodec or Ignored) and routed to its decoder.
//! Reference fields come out as [`Reference::Unresolved`] placeholders. The
//! [`CascadeResolver`] later fills a whole batch in one lookup per target
//! collection.

pub mod cascade;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod descriptor;
pub mod document;
pub mod encoder;
pub mod error;
pub mod mapper;
pub mod reference;
pub mod store;

// Re-export main types for convenience
pub use cascade::{CascadeResolver, ResolveOptions, ResolveReport};
pub use codec::{Codec, CodecError, CodecRef, CodecRegistry};
pub use config::MapperConfig;
pub use decoder::{decode, decode_batch};
pub use descriptor::{
    Annotation, Classification, ContainerShape, Entity, FieldDescriptor, FieldType, Mapped, MappingBuilder,
    TypeMapping,
};
pub use document::{Document, FieldValue, ObjectId, RefId, ID_KEY};
pub use encoder::encode;
pub use error::{ConvertError, MapperError, MapperResult};
pub use mapper::Mapper;
pub use reference::{RefKey, Reference};
pub use store::{DocumentStore, MemoryStore, SledStore, StoreError};

//! Custom codecs.
//!
//! A field annotated with a codec bypasses the built-in decoders: the codec is
//! constructed from the field descriptor and the raw value, then asked for
//! the decoded value. Codecs are referenced either by type
//! ([`CodecRef::of`]) or by a name registered at startup in the global
//! [`CodecRegistry`] ([`CodecRef::named`]).

use crate::descriptor::FieldDescriptor;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use thiserror::Error;

/// Failure reported by a codec.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        CodecError(message.into())
    }
}

/// A user-supplied field codec.
///
/// `construct` is the fixed two-argument construction contract: the field's
/// descriptor and the raw stored value. `Output` must be exactly the Rust
/// type of the field the codec is attached to; this is checked when the
/// owning type's descriptors are derived.
pub trait Codec: Sized + Send + 'static {
    type Output: Send + Sync + 'static;

    fn construct(descriptor: &FieldDescriptor, raw: &Value) -> Result<Self, CodecError>;

    fn decode(self) -> Result<Self::Output, CodecError>;

    fn encode(descriptor: &FieldDescriptor, value: &Self::Output) -> Result<Value, CodecError>;
}

type DecodeFn = fn(&FieldDescriptor, &Value) -> Result<Box<dyn Any + Send>, CodecError>;
type EncodeFn = fn(&FieldDescriptor, &dyn Any) -> Result<Value, CodecError>;

/// Type-erased entry points of one [`Codec`] implementation.
#[derive(Clone, Copy)]
pub struct CodecVTable {
    pub name: &'static str,
    pub output_type: TypeId,
    pub output_type_name: &'static str,
    decode: DecodeFn,
    encode: EncodeFn,
}

impl CodecVTable {
    pub fn of<C: Codec>() -> Self {
        Self {
            name: type_name::<C>(),
            output_type: TypeId::of::<C::Output>(),
            output_type_name: type_name::<C::Output>(),
            decode: decode_with::<C>,
            encode: encode_with::<C>,
        }
    }

    /// Constructs the codec and returns its boxed output.
    pub fn decode(&self, descriptor: &FieldDescriptor, raw: &Value) -> Result<Box<dyn Any + Send>, CodecError> {
        (self.decode)(descriptor, raw)
    }

    pub fn encode(&self, descriptor: &FieldDescriptor, value: &dyn Any) -> Result<Value, CodecError> {
        (self.encode)(descriptor, value)
    }
}

impl fmt::Debug for CodecVTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecVTable")
            .field("name", &self.name)
            .field("output_type", &self.output_type_name)
            .finish()
    }
}

impl PartialEq for CodecVTable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.output_type == other.output_type
    }
}

fn decode_with<C: Codec>(descriptor: &FieldDescriptor, raw: &Value) -> Result<Box<dyn Any + Send>, CodecError> {
    let codec = C::construct(descriptor, raw)?;
    let output = codec.decode()?;
    Ok(Box::new(output))
}

fn encode_with<C: Codec>(descriptor: &FieldDescriptor, value: &dyn Any) -> Result<Value, CodecError> {
    let value = value.downcast_ref::<C::Output>().ok_or_else(|| {
        CodecError::new(format!(
            "codec {} cannot encode a value that is not {}",
            type_name::<C>(),
            type_name::<C::Output>()
        ))
    })?;
    C::encode(descriptor, value)
}

/// How a field names its codec.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecRef {
    Typed(CodecVTable),
    Named(String),
}

impl CodecRef {
    pub fn of<C: Codec>() -> Self {
        CodecRef::Typed(CodecVTable::of::<C>())
    }

    pub fn named(name: impl Into<String>) -> Self {
        CodecRef::Named(name.into())
    }

    /// Resolves to a vtable, consulting the global registry for names.
    pub fn resolve(&self) -> Option<CodecVTable> {
        match self {
            CodecRef::Typed(vtable) => Some(*vtable),
            CodecRef::Named(name) => CodecRegistry::global().get(name),
        }
    }
}

/// Startup-time table of named codecs.
pub struct CodecRegistry {
    codecs: RwLock<HashMap<String, CodecVTable>>,
}

static GLOBAL_REGISTRY: Lazy<CodecRegistry> = Lazy::new(CodecRegistry::new);

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            codecs: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry consulted by [`CodecRef::named`].
    pub fn global() -> &'static CodecRegistry {
        &GLOBAL_REGISTRY
    }

    /// Registers `C` under `name`, replacing any previous registration.
    /// Types whose descriptors were already derived keep the codec they
    /// were derived with.
    pub fn register<C: Codec>(&self, name: impl Into<String>) {
        let name = name.into();
        let vtable = CodecVTable::of::<C>();
        log::debug!("Registering codec {} as {:?}", vtable.name, name);
        let mut codecs = match self.codecs.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        codecs.insert(name, vtable);
    }

    pub fn get(&self, name: &str) -> Option<CodecVTable> {
        let codecs = match self.codecs.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        codecs.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

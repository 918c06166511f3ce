//! # Mapper Error Handling
//!
//! Error types for descriptor registration, per-field decoding and cascade
//! resolution.
//!
//! Absent values are never errors: a missing field, a missing id or a
//! referenced document that does not exist all decode to default or marker
//! values. Everything in this module describes data that is present but
//! unusable, or an environment that failed.

use crate::store::StoreError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type MapperResult<T> = Result<T, MapperError>;

/// Unified error type for mapper operations.
#[derive(Error, Debug)]
pub enum MapperError {
    // ========== Registration Errors ==========
    /// Field metadata for a type is unusable. Raised when the type's
    /// descriptors are first derived and fatal for that type.
    #[error("Descriptor error for {type_name}.{field}: {reason}")]
    Descriptor {
        type_name: String,
        field: String,
        reason: String,
    },

    // ========== Per-field Decode Errors ==========
    /// A present identifier could not be coerced into the declared id type
    #[error("Identity conversion failed for field {field}: {source}")]
    IdentityConversion {
        field: String,
        #[source]
        source: ConvertError,
    },

    /// A present value has the wrong shape or type for its field
    #[error("Type mismatch for field {field}: {source}")]
    TypeMismatch {
        field: String,
        #[source]
        source: ConvertError,
    },

    /// A custom codec could not be constructed or did not produce a value
    /// assignable to its field
    #[error("Codec construction failed for field {field}: {reason}")]
    CodecConstruction { field: String, reason: String },

    // ========== Resolution Errors ==========
    /// The batched lookup against one target collection failed
    #[error("Lookup failed for collection {collection}: {source}")]
    LookupFailure {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// A field name passed to the resolver does not exist on the type
    #[error("Field not found: {field} on {type_name}")]
    UnknownField { type_name: String, field: String },

    /// A field name passed to the resolver is not a reference field
    #[error("Field {field} on {type_name} is not a reference field")]
    NotAReference { type_name: String, field: String },

    // ========== Infrastructure Errors ==========
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MapperError {
    /// Prefixes the field path of a per-field error with `parent`, so errors
    /// raised inside embedded documents name the full path (`contact.email`).
    pub fn within(self, parent: &str) -> Self {
        match self {
            MapperError::IdentityConversion { field, source } => MapperError::IdentityConversion {
                field: format!("{}.{}", parent, field),
                source,
            },
            MapperError::TypeMismatch { field, source } => MapperError::TypeMismatch {
                field: format!("{}.{}", parent, field),
                source,
            },
            MapperError::CodecConstruction { field, reason } => MapperError::CodecConstruction {
                field: format!("{}.{}", parent, field),
                reason,
            },
            other => other,
        }
    }

    /// Returns true for the per-field decode failures.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            MapperError::IdentityConversion { .. }
                | MapperError::TypeMismatch { .. }
                | MapperError::CodecConstruction { .. }
        )
    }
}

/// Low-level value conversion failure, before it is attributed to a field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot parse {value:?} as {target}")]
    Parse { value: String, target: &'static str },
}

impl ConvertError {
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        ConvertError::Mismatch { expected, found }
    }

    pub fn parse(value: impl Into<String>, target: &'static str) -> Self {
        ConvertError::Parse {
            value: value.into(),
            target,
        }
    }
}

impl From<toml::de::Error> for MapperError {
    fn from(error: toml::de::Error) -> Self {
        MapperError::Config(error.to_string())
    }
}

impl From<std::io::Error> for MapperError {
    fn from(error: std::io::Error) -> Self {
        MapperError::Config(error.to_string())
    }
}

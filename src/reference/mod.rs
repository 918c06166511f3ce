//! Reference placeholders.
//!
//! A reference field holds a [`Reference`] per foreign id. Decoding produces
//! `Unresolved` placeholders; the cascade resolver later replaces them with
//! `Resolved` targets or explicit `Missing` markers. The placeholder is a
//! value the caller must match on, so an unresolved reference can never be
//! mistaken for a loaded object.

use crate::document::{Document, RefId};
use std::fmt;

/// Target collection and foreign id of one reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefKey {
    pub collection: String,
    pub id: RefId,
}

impl RefKey {
    pub fn new(collection: impl Into<String>, id: impl Into<RefId>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A reference to an entity stored in another collection.
pub enum Reference<E> {
    /// Id only; not yet looked up
    Unresolved(RefKey),
    /// Looked up and decoded
    Resolved(RefKey, Box<E>),
    /// Looked up; no document with this id exists
    Missing(RefKey),
}

impl<E> Reference<E> {
    pub fn unresolved(collection: impl Into<String>, id: impl Into<RefId>) -> Self {
        Reference::Unresolved(RefKey::new(collection, id))
    }

    pub fn resolved(key: RefKey, value: E) -> Self {
        Reference::Resolved(key, Box::new(value))
    }

    pub fn key(&self) -> &RefKey {
        match self {
            Reference::Unresolved(key) | Reference::Resolved(key, _) | Reference::Missing(key) => key,
        }
    }

    pub fn id(&self) -> &RefId {
        &self.key().id
    }

    pub fn collection(&self) -> &str {
        &self.key().collection
    }

    /// The resolved target, if any.
    pub fn get(&self) -> Option<&E> {
        match self {
            Reference::Resolved(_, value) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut E> {
        match self {
            Reference::Resolved(_, value) => Some(value),
            _ => None,
        }
    }

    pub fn into_resolved(self) -> Option<E> {
        match self {
            Reference::Resolved(_, value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Reference::Unresolved(_))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(..))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Reference::Missing(_))
    }

    /// Drops any resolved target and returns to placeholder form.
    pub fn reset(&mut self) {
        let key = self.key().clone();
        *self = Reference::Unresolved(key);
    }
}

impl<E: Clone> Clone for Reference<E> {
    fn clone(&self) -> Self {
        match self {
            Reference::Unresolved(key) => Reference::Unresolved(key.clone()),
            Reference::Resolved(key, value) => Reference::Resolved(key.clone(), value.clone()),
            Reference::Missing(key) => Reference::Missing(key.clone()),
        }
    }
}

impl<E: PartialEq> PartialEq for Reference<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Reference::Unresolved(a), Reference::Unresolved(b)) => a == b,
            (Reference::Resolved(a, x), Reference::Resolved(b, y)) => a == b && x == y,
            (Reference::Missing(a), Reference::Missing(b)) => a == b,
            _ => false,
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for Reference<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Unresolved(key) => f.debug_tuple("Unresolved").field(key).finish(),
            Reference::Resolved(key, value) => {
                f.debug_tuple("Resolved").field(key).field(value).finish()
            }
            Reference::Missing(key) => f.debug_tuple("Missing").field(key).finish(),
        }
    }
}

/// One step from a top-level field down to a single placeholder: a sequence
/// position, a map key or a field of an embedded object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Index(usize),
    Key(String),
    Field(&'static str),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Key(k) => write!(f, "[{:?}]", k),
            PathSegment::Field(name) => write!(f, ".{}", name),
        }
    }
}

/// A placeholder found inside a field, with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRef {
    pub path: Vec<PathSegment>,
    pub key: RefKey,
}

/// Outcome of a lookup for one placeholder.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Found(&'a Document),
    Missing,
}

//! The store boundary.
//!
//! The mapper needs exactly one thing from a store: fetch a batch of
//! documents of one collection by id. Ids with no document are simply absent
//! from the result.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::document::{Document, RefId};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by a [`DocumentStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A document cannot be stored without a usable `_id`
    #[error("Document has no usable id under key {key}")]
    MissingId { key: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Batched lookup by id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_ids(&self, collection: &str, ids: &[RefId]) -> Result<HashMap<RefId, Document>, StoreError>;
}

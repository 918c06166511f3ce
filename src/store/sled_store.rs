//! sled-backed document store.
//!
//! Each collection is its own tree. Documents are stored as JSON bytes under
//! the type-tagged storage key of their id.

use super::{DocumentStore, StoreError};
use crate::document::{document_id, Document, RefId, ID_KEY};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::task;

#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::new(sled::open(path)?))
    }

    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Stores `document` under its `_id`, replacing any previous version.
    pub fn insert(&self, collection: &str, document: &Document) -> Result<RefId, StoreError> {
        let id = document_id(document).ok_or_else(|| StoreError::MissingId {
            key: ID_KEY.to_string(),
        })?;
        let bytes = serde_json::to_vec(document)?;

        let tree = self.db.open_tree(collection)?;
        tree.insert(id.storage_key().as_bytes(), bytes)?;

        // Ensure the data is durably written to disk
        tree.flush()?;
        Ok(id)
    }

    pub fn get(&self, collection: &str, id: &RefId) -> Result<Option<Document>, StoreError> {
        let tree = self.db.open_tree(collection)?;
        match tree.get(id.storage_key().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.db.open_tree(collection)?.len())
    }

    fn find_blocking(&self, collection: &str, ids: &[RefId]) -> Result<HashMap<RefId, Document>, StoreError> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(document) = self.get(collection, id)? {
                found.insert(id.clone(), document);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl DocumentStore for SledStore {
    async fn find_by_ids(&self, collection: &str, ids: &[RefId]) -> Result<HashMap<RefId, Document>, StoreError> {
        let store = self.clone();
        let collection = collection.to_string();
        let ids = ids.to_vec();

        task::spawn_blocking(move || store.find_blocking(&collection, &ids))
            .await
            .map_err(|e| StoreError::Unavailable(format!("Async task failed: {}", e)))?
    }
}

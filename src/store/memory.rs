use super::{DocumentStore, StoreError};
use crate::document::{document_id, Document, RefId, ID_KEY};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-process store keyed by collection and id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<RefId, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `document`, keyed by its `_id`.
    pub fn insert(&self, collection: &str, document: Document) -> Result<RefId, StoreError> {
        let id = document_id(&document).ok_or_else(|| StoreError::MissingId {
            key: ID_KEY.to_string(),
        })?;
        let mut collections = match self.collections.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), document);
        Ok(id)
    }

    pub fn insert_many<I>(&self, collection: &str, documents: I) -> Result<Vec<RefId>, StoreError>
    where
        I: IntoIterator<Item = Document>,
    {
        documents
            .into_iter()
            .map(|document| self.insert(collection, document))
            .collect()
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        let collections = match self.collections.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        collections.get(collection).map(HashMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_by_ids(&self, collection: &str, ids: &[RefId]) -> Result<HashMap<RefId, Document>, StoreError> {
        let collections = match self.collections.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let documents = match collections.get(collection) {
            Some(documents) => documents,
            None => return Ok(HashMap::new()),
        };
        Ok(ids
            .iter()
            .filter_map(|id| documents.get(id).map(|doc| (id.clone(), doc.clone())))
            .collect())
    }
}

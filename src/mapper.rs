//! The mapper facade: decoding, encoding and reference resolution against
//! one store, under one configuration.

use crate::cascade::{CascadeResolver, ResolveOptions, ResolveReport};
use crate::config::MapperConfig;
use crate::decoder;
use crate::descriptor::Mapped;
use crate::document::Document;
use crate::encoder;
use crate::error::MapperResult;
use crate::store::DocumentStore;
use log::warn;
use std::sync::Arc;

#[derive(Clone)]
pub struct Mapper {
    store: Arc<dyn DocumentStore>,
    config: MapperConfig,
    resolver: CascadeResolver,
}

impl Mapper {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, MapperConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: MapperConfig) -> Self {
        let resolver = CascadeResolver::new(Arc::clone(&store));
        let resolver = if config.concurrent_lookups {
            resolver
        } else {
            resolver.sequential()
        };
        Self {
            store,
            config,
            resolver,
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Decodes one document, resolving its references first when the
    /// mapper is eager.
    pub async fn decode<T: Mapped>(&self, document: &Document) -> MapperResult<T> {
        let mut object: T = decoder::decode(document)?;
        if self.config.eager {
            self.resolve_eagerly(std::slice::from_mut(&mut object)).await?;
        }
        Ok(object)
    }

    /// Decodes a batch. An eager mapper resolves the whole batch together,
    /// one lookup per target collection.
    pub async fn decode_batch<T: Mapped>(&self, documents: &[Document]) -> MapperResult<Vec<T>> {
        let mut batch: Vec<T> = decoder::decode_batch(documents)?;
        if self.config.eager {
            self.resolve_eagerly(&mut batch).await?;
        }
        Ok(batch)
    }

    /// Resolves one reference field across `instances`.
    pub async fn resolve_references<T: Mapped>(
        &self,
        instances: &mut [T],
        field: &str,
        options: ResolveOptions,
    ) -> MapperResult<ResolveReport> {
        self.resolver.resolve(instances, &[field], options).await
    }

    /// Resolves several reference fields across `instances` in one pass, so
    /// fields pointing at the same collection share its lookup.
    pub async fn resolve_fields<T: Mapped>(
        &self,
        instances: &mut [T],
        fields: &[&str],
        options: ResolveOptions,
    ) -> MapperResult<ResolveReport> {
        self.resolver.resolve(instances, fields, options).await
    }

    pub fn encode<T: Mapped>(&self, object: &T) -> MapperResult<Document> {
        encoder::encode(object)
    }

    async fn resolve_eagerly<T: Mapped>(&self, batch: &mut [T]) -> MapperResult<()> {
        let report = self.resolver.resolve_all(batch, ResolveOptions::default()).await?;
        for failure in &report.failures {
            warn!("Eager resolution left placeholders in place: {}", failure);
        }
        Ok(())
    }
}

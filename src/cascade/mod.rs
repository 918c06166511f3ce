//! Cascade resolution of reference placeholders.
//!
//! A resolve call walks the named reference fields of every object in a
//! batch, groups the pending foreign ids by target collection, issues one
//! batched lookup per collection and writes the outcomes back into the
//! exact positions the placeholders came from.

use crate::descriptor::{Mapped, MappedField, TypeMapping};
use crate::document::{Document, RefId};
use crate::error::{MapperError, MapperResult};
use crate::reference::{PathSegment, RefKey, Resolution};
use crate::store::{DocumentStore, StoreError};
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Options for one resolve call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Look up Resolved and Missing entries again instead of skipping them
    pub refresh: bool,
}

impl ResolveOptions {
    pub fn refresh() -> Self {
        Self { refresh: true }
    }
}

/// What a resolve call did.
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// One entry per lookup issued: collection and the distinct ids requested
    pub lookups: Vec<(String, Vec<RefId>)>,
    pub resolved: usize,
    pub missing: usize,
    /// Placeholders left in place because their lookup or decode failed
    pub unresolved: usize,
    pub failures: Vec<MapperError>,
}

impl ResolveReport {
    /// True when every pending placeholder received an outcome.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.unresolved == 0
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.len()
    }

    /// Ids requested from `collection`, if it was looked up.
    pub fn requested(&self, collection: &str) -> Option<&[RefId]> {
        self.lookups
            .iter()
            .find(|(name, _)| name == collection)
            .map(|(_, ids)| ids.as_slice())
    }
}

/// A placeholder recorded during planning.
struct WriteBack {
    object: usize,
    field: usize,
    path: Vec<PathSegment>,
    key: RefKey,
}

/// Resolves reference fields against a [`DocumentStore`].
#[derive(Clone)]
pub struct CascadeResolver {
    store: Arc<dyn DocumentStore>,
    concurrent: bool,
}

impl CascadeResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            concurrent: true,
        }
    }

    /// Issue per-collection lookups one after another instead of
    /// concurrently.
    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }

    /// Resolves `fields` across `batch`.
    ///
    /// Fails only when a name is not a reference field of `T`. Lookup
    /// failures are collected in the report; the affected placeholders are
    /// left as they were and every other collection is still resolved.
    pub async fn resolve<T: Mapped>(
        &self,
        batch: &mut [T],
        fields: &[&str],
        options: ResolveOptions,
    ) -> MapperResult<ResolveReport> {
        let mapping = TypeMapping::<T>::get()?;
        let selected = select_fields(&mapping, fields)?;
        self.resolve_selected(&mapping, batch, &selected, options).await
    }

    /// Resolves every reference of `T`, including those held by embedded
    /// objects at any depth.
    pub async fn resolve_all<T: Mapped>(&self, batch: &mut [T], options: ResolveOptions) -> MapperResult<ResolveReport> {
        let mapping = TypeMapping::<T>::get()?;
        let selected = mapping.cascading_fields();
        self.resolve_selected(&mapping, batch, &selected, options).await
    }

    async fn resolve_selected<T: Mapped>(
        &self,
        mapping: &TypeMapping<T>,
        batch: &mut [T],
        selected: &[&MappedField<T>],
        options: ResolveOptions,
    ) -> MapperResult<ResolveReport> {
        let mut plan: BTreeMap<String, BTreeSet<RefId>> = BTreeMap::new();
        let mut write_backs = Vec::new();
        for (object_index, object) in batch.iter().enumerate() {
            for (field_index, field) in selected.iter().enumerate() {
                let mut pending = Vec::new();
                field.slot().collect_refs(object, &mut Vec::new(), options.refresh, &mut pending);
                for entry in pending {
                    plan.entry(entry.key.collection.clone())
                        .or_default()
                        .insert(entry.key.id.clone());
                    write_backs.push(WriteBack {
                        object: object_index,
                        field: field_index,
                        path: entry.path,
                        key: entry.key,
                    });
                }
            }
        }

        let mut report = ResolveReport {
            lookups: plan
                .into_iter()
                .map(|(collection, ids)| (collection, ids.into_iter().collect()))
                .collect(),
            ..Default::default()
        };
        if write_backs.is_empty() {
            debug!("No pending references in {} {} objects", batch.len(), mapping.type_name());
            return Ok(report);
        }

        let results = self.lookup_all(&report.lookups).await;

        let mut found: HashMap<&str, HashMap<RefId, Document>> = HashMap::new();
        let mut failures = Vec::new();
        for ((collection, ids), result) in report.lookups.iter().zip(results) {
            match result {
                Ok(documents) => {
                    debug!("Fetched {} of {} ids from {}", documents.len(), ids.len(), collection);
                    found.insert(collection.as_str(), documents);
                }
                Err(source) => {
                    warn!("Lookup of {} ids in {} failed: {}", ids.len(), collection, source);
                    failures.push(MapperError::LookupFailure {
                        collection: collection.clone(),
                        source,
                    });
                }
            }
        }

        let (mut resolved, mut missing, mut unresolved) = (0, 0, 0);
        for write_back in &write_backs {
            let documents = match found.get(write_back.key.collection.as_str()) {
                Some(documents) => documents,
                None => {
                    unresolved += 1;
                    continue;
                }
            };
            let resolution = match documents.get(&write_back.key.id) {
                Some(document) => Resolution::Found(document),
                None => {
                    warn!("Referenced document {} not found", write_back.key);
                    Resolution::Missing
                }
            };

            let field = selected[write_back.field];
            let object = &mut batch[write_back.object];
            match field.slot().fill_ref(object, &write_back.path, resolution) {
                Ok(true) => match resolution {
                    Resolution::Found(_) => resolved += 1,
                    Resolution::Missing => missing += 1,
                },
                Ok(false) => {
                    unresolved += 1;
                    failures.push(MapperError::Internal(format!(
                        "no placeholder at {}{} for {}",
                        field.descriptor().name,
                        format_path(&write_back.path),
                        write_back.key
                    )));
                }
                Err(e) => {
                    warn!("Could not decode referenced document {}: {}", write_back.key, e);
                    unresolved += 1;
                    failures.push(e.within(field.descriptor().name));
                }
            }
        }

        report.resolved = resolved;
        report.missing = missing;
        report.unresolved = unresolved;
        report.failures = failures;

        let fields: Vec<&str> = selected.iter().map(|field| field.descriptor().name).collect();
        info!(
            "Resolved {:?} on {} {} objects: {} lookups, {} resolved, {} missing, {} unresolved",
            fields,
            batch.len(),
            mapping.type_name(),
            report.lookups.len(),
            report.resolved,
            report.missing,
            report.unresolved
        );
        Ok(report)
    }

    async fn lookup_all(&self, lookups: &[(String, Vec<RefId>)]) -> Vec<Result<HashMap<RefId, Document>, StoreError>> {
        if self.concurrent {
            join_all(
                lookups
                    .iter()
                    .map(|(collection, ids)| self.store.find_by_ids(collection, ids)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(lookups.len());
            for (collection, ids) in lookups {
                results.push(self.store.find_by_ids(collection, ids).await);
            }
            results
        }
    }
}

fn select_fields<'a, T: Mapped>(mapping: &'a TypeMapping<T>, names: &[&str]) -> MapperResult<Vec<&'a MappedField<T>>> {
    let mut selected: Vec<&MappedField<T>> = Vec::with_capacity(names.len());
    for name in names {
        let field = mapping.field(name).ok_or_else(|| MapperError::UnknownField {
            type_name: mapping.type_name().to_string(),
            field: name.to_string(),
        })?;
        if !field.descriptor().classification.is_reference() {
            return Err(MapperError::NotAReference {
                type_name: mapping.type_name().to_string(),
                field: name.to_string(),
            });
        }
        if !selected.iter().any(|f| f.descriptor().name == field.descriptor().name) {
            selected.push(field);
        }
    }
    Ok(selected)
}

fn format_path(path: &[PathSegment]) -> String {
    path.iter().map(ToString::to_string).collect()
}

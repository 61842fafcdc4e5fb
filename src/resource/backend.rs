use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::db::models::{
    is_meta_field, parse_datetime, Document, Lookup, DATE_CREATED, ID_FIELD, LAST_UPDATED,
};
use crate::db::repository::DocumentStore;
use crate::error::AppError;
use crate::notification::{Notification, NotificationBus};
use crate::resource::diff::updated_fields;
use crate::search::client::SearchIndex;
use crate::search::query::SearchQuery;

/// Per-entity configuration of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Name used in notifications and for lookups in the registry.
    pub name: String,
    /// Collection (and search repo) holding the documents.
    pub datasource: String,
    /// Mirror documents into the search index.
    pub searchable: bool,
}

impl ResourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            datasource: name.clone(),
            name,
            searchable: false,
        }
    }

    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = datasource.into();
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }
}

/// Generic create/find/update/delete over document collections.
///
/// Owns id, timestamp and etag assignment, keeps searchable resources in
/// the search index and emits the `resource:*` notifications.
pub struct ResourceBackend {
    store: Arc<dyn DocumentStore>,
    search: Option<Arc<dyn SearchIndex>>,
    bus: NotificationBus,
}

impl ResourceBackend {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        search: Option<Arc<dyn SearchIndex>>,
        bus: NotificationBus,
    ) -> Self {
        Self { store, search, bus }
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Turn raw fields into a new document: id, timestamps and etag are
    /// taken from the fields when supplied, generated otherwise.
    pub fn build_document(&self, mut fields: Map<String, Value>) -> Document {
        let now = Utc::now();
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            Some(other) => other.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let created = fields
            .get(DATE_CREATED)
            .and_then(parse_datetime)
            .unwrap_or(now);
        let updated = fields
            .get(LAST_UPDATED)
            .and_then(parse_datetime)
            .unwrap_or(created);
        fields.retain(|key, _| !is_meta_field(key));

        let etag = compute_etag("", &fields, updated);
        Document {
            id,
            created,
            updated,
            etag,
            fields,
        }
    }

    /// Build and persist new documents. Returns their ids.
    pub async fn create(
        &self,
        config: &ResourceConfig,
        items: Vec<Map<String, Value>>,
    ) -> Result<Vec<String>, AppError> {
        let docs: Vec<Document> = items.into_iter().map(|f| self.build_document(f)).collect();
        self.insert(config, docs).await
    }

    /// Persist documents already built with `build_document`.
    pub async fn insert(
        &self,
        config: &ResourceConfig,
        docs: Vec<Document>,
    ) -> Result<Vec<String>, AppError> {
        self.store.insert(&config.datasource, &docs).await?;

        for doc in &docs {
            self.index(config, doc).await;
            self.bus.publish(Notification::ResourceCreated {
                resource: config.name.clone(),
                id: doc.id.clone(),
            });
        }

        tracing::debug!(resource = %config.name, count = docs.len(), "created documents");
        Ok(docs.into_iter().map(|d| d.id).collect())
    }

    pub async fn find_one(
        &self,
        config: &ResourceConfig,
        lookup: &Lookup,
    ) -> Result<Option<Document>, AppError> {
        self.store.find_one(&config.datasource, lookup).await
    }

    pub async fn find(
        &self,
        config: &ResourceConfig,
        lookup: &Lookup,
    ) -> Result<Vec<Document>, AppError> {
        self.store.find(&config.datasource, lookup).await
    }

    /// Apply `updates` to the stored document `id`.
    ///
    /// The changed field set pushed with `resource:updated` is computed
    /// against `original`, the caller's view of the document.
    pub async fn update(
        &self,
        config: &ResourceConfig,
        id: &str,
        updates: &Map<String, Value>,
        original: &Map<String, Value>,
    ) -> Result<Document, AppError> {
        let changed = updated_fields(updates, original);

        let mut doc = self
            .store
            .find_one(&config.datasource, &Lookup::id(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} '{}'", config.name, id)))?;

        for (key, value) in updates {
            if !is_meta_field(key) {
                doc.fields.insert(key.clone(), value.clone());
            }
        }
        doc.updated = updates
            .get(LAST_UPDATED)
            .and_then(parse_datetime)
            .unwrap_or_else(Utc::now);
        doc.etag = compute_etag(&doc.etag, &doc.fields, doc.updated);

        if !self.store.replace(&config.datasource, &doc).await? {
            return Err(AppError::NotFound(format!("{} '{}'", config.name, id)));
        }

        self.index(config, &doc).await;
        self.bus.publish(Notification::ResourceUpdated {
            resource: config.name.clone(),
            id: doc.id.clone(),
            fields: changed.into_iter().map(|f| (f, 1)).collect(),
        });

        Ok(doc)
    }

    /// Remove every document matching the lookup.
    ///
    /// Each removal re-checks the lookup in the store, so a document that
    /// stopped matching after it was found is left alone.
    pub async fn delete(
        &self,
        config: &ResourceConfig,
        lookup: &Lookup,
    ) -> Result<Vec<Document>, AppError> {
        let candidates = self.store.find(&config.datasource, lookup).await?;
        let mut removed = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let guard = Lookup::And(vec![Lookup::id(candidate.id.clone()), lookup.clone()]);
            let Some(doc) = self.store.delete_one(&config.datasource, &guard).await? else {
                continue;
            };

            if config.searchable {
                if let Some(search) = &self.search {
                    if let Err(e) = search.delete_document(&config.datasource, &doc.id).await {
                        tracing::warn!("Failed to remove {} from search: {e}", doc.id);
                    }
                }
            }
            self.bus.publish(Notification::ResourceDeleted {
                resource: config.name.clone(),
                id: doc.id.clone(),
            });
            removed.push(doc);
        }

        Ok(removed)
    }

    /// Query the search index over the given repos.
    pub async fn search(
        &self,
        repos: &[&str],
        query: &SearchQuery,
    ) -> Result<Vec<Document>, AppError> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| AppError::Search("search index not configured".into()))?;
        search.search(repos, query).await
    }

    async fn index(&self, config: &ResourceConfig, doc: &Document) {
        if !config.searchable {
            return;
        }
        if let Some(search) = &self.search {
            if let Err(e) = search.index_document(&config.datasource, doc).await {
                tracing::warn!("Failed to index {} in search: {e}", doc.id);
            }
        }
    }
}

/// Derive a new etag from the previous one, the content and the
/// modification time.
pub fn compute_etag(previous: &str, fields: &Map<String, Value>, updated: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous.as_bytes());
    hasher.update(Value::Object(fields.clone()).to_string().as_bytes());
    hasher.update(updated.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::models::{Document, Lookup};
use crate::db::repository::DocumentStore;
use crate::error::AppError;

/// Process-local DocumentStore, used by `storage = "memory"` and by tests.
///
/// Each operation holds the lock for its whole duration, which gives the
/// same per-document atomicity the Mongo store provides.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Document>>>, AppError> {
        self.collections
            .lock()
            .map_err(|_| AppError::Database("in-memory store poisoned".into()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, docs: &[Document]) -> Result<(), AppError> {
        let mut collections = self.lock()?;
        let stored = collections.entry(collection.to_string()).or_default();
        if let Some(dup) = docs.iter().find(|d| stored.iter().any(|s| s.id == d.id)) {
            return Err(AppError::Database(format!(
                "Duplicate id '{}' in {}",
                dup.id, collection
            )));
        }
        stored.extend(docs.iter().cloned());
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        lookup: &Lookup,
    ) -> Result<Option<Document>, AppError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| lookup.matches(d)).cloned()))
    }

    async fn find(&self, collection: &str, lookup: &Lookup) -> Result<Vec<Document>, AppError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| lookup.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn replace(&self, collection: &str, doc: &Document) -> Result<bool, AppError> {
        let mut collections = self.lock()?;
        let slot = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == doc.id));
        match slot {
            Some(slot) => {
                *slot = doc.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(
        &self,
        collection: &str,
        lookup: &Lookup,
    ) -> Result<Option<Document>, AppError> {
        let mut collections = self.lock()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .position(|d| lookup.matches(d))
            .map(|pos| docs.remove(pos)))
    }
}

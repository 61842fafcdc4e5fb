use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::db::models::Document;
use crate::error::AppError;
use crate::search::client::SearchIndex;
use crate::search::query::SearchQuery;

/// Process-local SearchIndex, used by `storage = "memory"` and by tests.
#[derive(Default)]
pub struct InMemorySearchIndex {
    repos: Mutex<HashMap<String, HashMap<String, Document>>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents indexed for a repo.
    pub fn len(&self, repo: &str) -> usize {
        self.repos
            .lock()
            .map(|repos| repos.get(repo).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn index_document(&self, repo: &str, doc: &Document) -> Result<(), AppError> {
        let mut repos = self
            .repos
            .lock()
            .map_err(|_| AppError::Search("in-memory index poisoned".into()))?;
        repos
            .entry(repo.to_string())
            .or_default()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn delete_document(&self, repo: &str, id: &str) -> Result<(), AppError> {
        let mut repos = self
            .repos
            .lock()
            .map_err(|_| AppError::Search("in-memory index poisoned".into()))?;
        if let Some(docs) = repos.get_mut(repo) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn search(
        &self,
        repos: &[&str],
        query: &SearchQuery,
    ) -> Result<Vec<Document>, AppError> {
        let indexed = self
            .repos
            .lock()
            .map_err(|_| AppError::Search("in-memory index poisoned".into()))?;

        let mut hits: Vec<(Value, &Document)> = repos
            .iter()
            .filter_map(|repo| indexed.get(*repo))
            .flat_map(|docs| docs.values())
            .map(|doc| (doc.to_value(), doc))
            .filter(|(value, _)| query.matches(value))
            .collect();

        hits.sort_by(|(a, _), (b, _)| query.compare(a, b));
        Ok(hits
            .into_iter()
            .take(query.size)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn configure_index(&self, _repo: &str) -> Result<(), AppError> {
        Ok(())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use meilisearch_sdk::task_info::TaskInfo;
use meilisearch_sdk::tasks::Task;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::db::models::{parse_datetime, Document};
use crate::error::AppError;
use crate::search::query::{SearchFilter, SearchQuery};

/// Date fields mirrored as numeric `<field>_ts` attributes so the index can
/// range-filter and sort on them.
pub const DATE_FIELDS: [&str; 3] = ["versioncreated", "_created", "_updated"];

const TS_SUFFIX: &str = "_ts";

/// Primary key of every index. Document ids are free-form, index keys are not.
pub const SEARCH_KEY: &str = "search_key";

const TASK_POLL_INTERVAL: Duration = Duration::from_millis(50);
const TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// Index key for a document id.
///
/// Meilisearch keys allow `[A-Za-z0-9_-]` up to 511 bytes. Ids that fit are
/// used as they are; anything else (`urn:newsml:...` guids) becomes the hex
/// SHA-256 of the id behind a `sha256-` prefix.
pub fn search_key(id: &str) -> String {
    let valid = !id.is_empty()
        && id.len() <= 511
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        return id.to_string();
    }
    let digest: String = Sha256::digest(id.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("sha256-{digest}")
}

/// Trait for search operations, enabling mock testing.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Add or update a document in the given repo's index.
    async fn index_document(&self, repo: &str, doc: &Document) -> Result<(), AppError>;

    /// Remove a document from the given repo's index.
    async fn delete_document(&self, repo: &str, id: &str) -> Result<(), AppError>;

    /// Run a structured query over one or more repos.
    async fn search(&self, repos: &[&str], query: &SearchQuery)
        -> Result<Vec<Document>, AppError>;

    /// Configure filterable/sortable attributes of a repo's index.
    /// Should be called once on startup.
    async fn configure_index(&self, repo: &str) -> Result<(), AppError>;
}

/// Build the JSON stored in the index for a document.
pub fn build_search_document(doc: &Document) -> Value {
    let mut value = doc.to_value();
    if let Value::Object(object) = &mut value {
        object.insert(SEARCH_KEY.into(), Value::String(search_key(&doc.id)));
        for field in DATE_FIELDS {
            if let Some(ts) = object.get(field).and_then(parse_datetime) {
                object.insert(format!("{field}{TS_SUFFIX}"), Value::from(ts.timestamp()));
            }
        }
    }
    value
}

/// Turn an index hit back into a Document, dropping the mirrored attributes.
pub fn parse_search_hit(mut hit: Map<String, Value>) -> Result<Document, AppError> {
    hit.remove(SEARCH_KEY);
    for field in DATE_FIELDS {
        hit.remove(&format!("{field}{TS_SUFFIX}"));
    }
    serde_json::from_value(Value::Object(hit))
        .map_err(|e| AppError::Search(format!("Malformed search hit: {e}")))
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a query's filter in Meilisearch filter syntax.
pub fn to_meili_filter(query: &SearchQuery) -> String {
    query
        .filter
        .iter()
        .map(|f| match f {
            SearchFilter::Term { field, value } => format!("{field} = {}", quote(value)),
            SearchFilter::Range { field, gte } => {
                format!("{field}{TS_SUFFIX} >= {}", gte.timestamp())
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Render a query's sort in Meilisearch sort syntax.
pub fn to_meili_sort(query: &SearchQuery) -> Vec<String> {
    query
        .sort
        .iter()
        .map(|s| {
            let field = if DATE_FIELDS.contains(&s.field.as_str()) {
                format!("{}{TS_SUFFIX}", s.field)
            } else {
                s.field.clone()
            };
            format!("{field}:{}", if s.descending { "desc" } else { "asc" })
        })
        .collect()
}

/// Meilisearch implementation of the SearchIndex. One index per repo.
pub struct MeilisearchIndex {
    client: meilisearch_sdk::client::Client,
}

impl MeilisearchIndex {
    pub fn new(url: &str, api_key: Option<impl Into<String>>) -> Result<Self, AppError> {
        let client = meilisearch_sdk::client::Client::new(url, api_key.map(Into::<String>::into))
            .map_err(|e| AppError::Search(format!("Failed to create Meilisearch client: {e}")))?;
        Ok(Self { client })
    }

    fn index(&self, repo: &str) -> meilisearch_sdk::indexes::Index {
        self.client.index(repo)
    }

    /// Wait for an enqueued write and surface its failure.
    async fn settle(&self, task: TaskInfo, action: &str) -> Result<(), AppError> {
        let task = task
            .wait_for_completion(&self.client, Some(TASK_POLL_INTERVAL), Some(TASK_TIMEOUT))
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch {action} task error: {e}")))?;
        match task {
            Task::Failed { content } => Err(AppError::Search(format!(
                "Meilisearch {action} task failed: {}",
                content.error
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SearchIndex for MeilisearchIndex {
    async fn index_document(&self, repo: &str, doc: &Document) -> Result<(), AppError> {
        let body = build_search_document(doc);
        let task = self
            .index(repo)
            .add_documents(&[body], Some(SEARCH_KEY))
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch index error: {e}")))?;

        self.settle(task, "index").await
    }

    async fn delete_document(&self, repo: &str, id: &str) -> Result<(), AppError> {
        let task = self
            .index(repo)
            .delete_document(search_key(id))
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch delete error: {e}")))?;

        self.settle(task, "delete").await
    }

    async fn search(
        &self,
        repos: &[&str],
        query: &SearchQuery,
    ) -> Result<Vec<Document>, AppError> {
        let filter = to_meili_filter(query);
        let sort = to_meili_sort(query);
        let sort: Vec<&str> = sort.iter().map(String::as_str).collect();

        let mut hits: Vec<Value> = Vec::new();
        for repo in repos {
            let index = self.index(repo);
            let mut request = index.search();
            request.with_limit(query.size).with_sort(&sort);
            if !filter.is_empty() {
                request.with_filter(&filter);
            }

            let results: meilisearch_sdk::search::SearchResults<Map<String, Value>> = request
                .execute()
                .await
                .map_err(|e| AppError::Search(format!("Meilisearch search error: {e}")))?;

            hits.extend(results.hits.into_iter().map(|hit| Value::Object(hit.result)));
        }

        // Each repo is sorted by the index; merge them into one ordering.
        hits.sort_by(|a, b| query.compare(a, b));
        hits.truncate(query.size);

        hits.into_iter()
            .filter_map(|hit| match hit {
                Value::Object(map) => Some(parse_search_hit(map)),
                _ => None,
            })
            .collect()
    }

    async fn configure_index(&self, repo: &str) -> Result<(), AppError> {
        let index = self.index(repo);

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_filterable_attributes([
                "highlights",
                "item_id",
                "type",
                "versioncreated_ts",
                "_updated_ts",
            ])
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch config error: {e}")))?;

        let _: meilisearch_sdk::task_info::TaskInfo = index
            .set_sortable_attributes(["versioncreated_ts", "_updated_ts", "_created_ts"])
            .await
            .map_err(|e| AppError::Search(format!("Meilisearch config error: {e}")))?;

        Ok(())
    }
}

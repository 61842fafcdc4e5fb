use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};

use crate::db::models::{Document, Lookup};
use crate::error::AppError;
use crate::highlights::date_math::{resolve_auto_insert, DEFAULT_AUTO_INSERT};
use crate::notification::{MarkOperation, Notification};
use crate::resource::service::{ResourceHooks, Resources};
use crate::search::query::{SearchFilter, SearchQuery, SortField};

pub const ARCHIVE: &str = "archive";
pub const PUBLISHED: &str = "published";
pub const HIGHLIGHTS: &str = "highlights";
pub const DESKS: &str = "desks";

/// Upper bound of items collected for a highlight.
pub const HIGHLIGHTED_ITEMS_SIZE: usize = 200;

/// One entry of a mark-for-highlights request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkForHighlights {
    /// Id of the archive item to toggle.
    pub marked_item: String,
    /// Highlights to toggle; a single id is accepted too.
    #[serde(default, deserialize_with = "one_or_many")]
    pub highlights: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(id)) => vec![id],
        Some(OneOrMany::Many(ids)) => ids,
        None => Vec::new(),
    })
}

/// Display name of a highlight, when it exists and has one.
pub async fn get_highlight_name(
    resources: &Resources,
    highlight_id: &str,
) -> Result<Option<String>, AppError> {
    let highlight = resources.service(HIGHLIGHTS)?.find_by_id(highlight_id).await?;
    Ok(highlight.and_then(|h| h.get_str("name").map(str::to_string)))
}

fn highlight_ids(doc: &Document) -> Vec<Value> {
    doc.get("highlights")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Toggle highlights on items and mirror the result onto published copies.
///
/// Returns one entry per request: the item id, or `None` when the item
/// does not exist. Missing items do not stop the batch.
pub async fn toggle_highlights(
    resources: &Resources,
    requests: &[MarkForHighlights],
) -> Result<Vec<Option<String>>, AppError> {
    let archive = resources.service(ARCHIVE)?;
    let published = resources.service(PUBLISHED)?;
    let mut ids = Vec::with_capacity(requests.len());

    for request in requests {
        let Some(item) = archive.find_by_id(&request.marked_item).await? else {
            tracing::debug!(item = %request.marked_item, "item to mark not found");
            ids.push(None);
            continue;
        };
        ids.push(Some(item.id.clone()));

        let mut highlights = highlight_ids(&item);
        let mut operations = Vec::with_capacity(request.highlights.len());
        for highlight in &request.highlights {
            let value = Value::String(highlight.clone());
            if highlights.contains(&value) {
                highlights.retain(|h| *h != value);
                operations.push((highlight, MarkOperation::Unmark));
            } else {
                highlights.push(value);
                operations.push((highlight, MarkOperation::Mark));
            }
        }

        let mut updates = Map::new();
        updates.insert("highlights".into(), Value::Array(highlights.clone()));
        archive.update(&item.id, updates, &item).await?;

        if let Some(version) = item.get("_current_version") {
            for copy in published.find(&Lookup::eq("item_id", item.id.clone())).await? {
                if copy.get("_current_version") != Some(version) {
                    continue;
                }
                let mut updates = Map::new();
                updates.insert("highlights".into(), Value::Array(highlights.clone()));
                updates.insert("_updated".into(), Value::String(copy.updated.to_rfc3339()));
                published.update(&copy.id, updates, &copy).await?;
            }
        }

        for (highlight, operation) in operations {
            let highlight_name = get_highlight_name(resources, highlight).await?;
            resources.bus().publish(Notification::ItemHighlightActivity {
                item_id: item.id.clone(),
                highlight_id: highlight.clone(),
                highlight_name,
                operation,
            });
            resources.bus().publish(Notification::ItemHighlights {
                marked: u8::from(operation == MarkOperation::Mark),
                item_id: item.id.clone(),
                mark_id: highlight.clone(),
            });
        }
    }

    Ok(ids)
}

/// Items marked for a highlight and newer than its auto-insert cutoff,
/// newest first.
pub async fn get_highlighted_items(
    resources: &Resources,
    highlight_id: &str,
    tz: FixedOffset,
) -> Result<Vec<Document>, AppError> {
    let highlight = resources
        .service(HIGHLIGHTS)?
        .find_by_id(highlight_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("highlight '{highlight_id}'")))?;

    let expr = highlight.get_str("auto_insert").unwrap_or(DEFAULT_AUTO_INSERT);
    let cutoff = resolve_auto_insert(expr, Utc::now(), tz)?;

    let query = SearchQuery {
        filter: vec![
            SearchFilter::Range {
                field: "versioncreated".into(),
                gte: cutoff,
            },
            SearchFilter::Term {
                field: "highlights".into(),
                value: highlight_id.to_string(),
            },
        ],
        sort: vec![SortField::desc("versioncreated")],
        size: HIGHLIGHTED_ITEMS_SIZE,
    };
    resources.search(&[ARCHIVE, PUBLISHED], &query).await
}

/// Reference to an item as stored in a package group.
pub fn get_item_ref(item: &Document) -> Value {
    json!({
        "residRef": item.id,
        "guid": item.get("guid"),
        "headline": item.get("headline"),
        "slugline": item.get("slugline"),
        "type": item.get("type"),
        "location": ARCHIVE,
        "renditions": item.get("renditions").cloned().unwrap_or_else(|| json!({})),
        "_current_version": item.get("_current_version"),
    })
}

/// Strips a highlight from every item before the highlight is deleted.
pub struct HighlightCleanupHooks;

#[async_trait]
impl ResourceHooks for HighlightCleanupHooks {
    async fn on_delete(&self, resources: &Resources, doc: &Document) -> Result<(), AppError> {
        let archive = resources.service(ARCHIVE)?;
        let highlight_id = Value::String(doc.id.clone());
        let highlight_name = doc.get_str("name").map(str::to_string);

        let items = archive
            .find(&Lookup::contains("highlights", highlight_id.clone()))
            .await?;
        tracing::info!(highlight = %doc.id, items = items.len(), "removing deleted highlight from items");

        for item in items {
            resources.bus().publish(Notification::ItemHighlightActivity {
                item_id: item.id.clone(),
                highlight_id: doc.id.clone(),
                highlight_name: highlight_name.clone(),
                operation: MarkOperation::Unmark,
            });

            let mut highlights = highlight_ids(&item);
            highlights.retain(|h| *h != highlight_id);
            let mut updates = Map::new();
            updates.insert("highlights".into(), Value::Array(highlights));
            archive.update(&item.id, updates, &item).await?;
        }
        Ok(())
    }
}

/// Fills highlight packages with the currently highlighted items.
pub struct PackageHighlightHooks {
    tz: FixedOffset,
}

impl PackageHighlightHooks {
    pub fn new(tz: FixedOffset) -> Self {
        Self { tz }
    }

    async fn init_highlight_package(
        &self,
        resources: &Resources,
        package: &mut Document,
        highlight_id: &str,
    ) -> Result<(), AppError> {
        let items = get_highlighted_items(resources, highlight_id, self.tz).await?;

        let refs = package
            .fields
            .get_mut("groups")
            .and_then(Value::as_array_mut)
            .and_then(|groups| groups.get_mut(1))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                AppError::BadRequest(format!("package '{}' has no main group", package.id))
            })?
            .entry("refs")
            .or_insert_with(|| Value::Array(Vec::new()));
        let refs = refs.as_array_mut().ok_or_else(|| {
            AppError::BadRequest(format!("package '{}' main group refs is not a list", package.id))
        })?;

        let mut used: Vec<&str> = Vec::new();
        for item in &items {
            if used.contains(&item.id.as_str()) {
                continue;
            }
            refs.push(get_item_ref(item));
            used.push(&item.id);
        }
        Ok(())
    }

    async fn init_default_content_profile(
        &self,
        resources: &Resources,
        package: &mut Document,
    ) -> Result<(), AppError> {
        let has_profile = package
            .get("profile")
            .is_some_and(|p| !p.is_null() && p.as_str() != Some(""));
        if has_profile {
            return Ok(());
        }
        let Some(desk_id) = package.get_str("task.desk").map(str::to_string) else {
            return Ok(());
        };
        if let Some(desk) = resources.service(DESKS)?.find_by_id(&desk_id).await? {
            if let Some(profile) = desk.get("default_content_profile") {
                package.fields.insert("profile".into(), profile.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHooks for PackageHighlightHooks {
    async fn on_create(&self, resources: &Resources, docs: &mut [Document]) -> Result<(), AppError> {
        for doc in docs.iter_mut() {
            if doc.get_str("type") != Some("composite") {
                continue;
            }
            let Some(highlight_id) = doc.get_str("highlight").map(str::to_string) else {
                continue;
            };
            self.init_highlight_package(resources, doc, &highlight_id).await?;
            self.init_default_content_profile(resources, doc).await?;
        }
        Ok(())
    }
}

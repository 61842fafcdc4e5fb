use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::db::models::parse_datetime;

/// A structured search request: filter + sort + size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub filter: Vec<SearchFilter>,
    pub sort: Vec<SortField>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFilter {
    /// The field equals `value`, or is a list containing it.
    Term { field: String, value: String },
    /// The date field is at or after `gte`.
    Range { field: String, gte: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

impl SortField {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

impl SearchQuery {
    /// Evaluate the filter against a JSON document.
    pub fn matches(&self, doc: &Value) -> bool {
        self.filter.iter().all(|f| match f {
            SearchFilter::Term { field, value } => match doc.get(field) {
                Some(Value::Array(items)) => items.iter().any(|i| i.as_str() == Some(value)),
                Some(Value::String(s)) => s == value,
                _ => false,
            },
            SearchFilter::Range { field, gte } => doc
                .get(field)
                .and_then(parse_datetime)
                .is_some_and(|dt| dt >= *gte),
        })
    }

    /// Order two documents by the sort fields. Date strings sort
    /// chronologically, missing values last.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for sort in &self.sort {
            let ordering = match (sort_key(a.get(&sort.field)), sort_key(b.get(&sort.field))) {
                (Some(x), Some(y)) => {
                    let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                    if sort.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn sort_key(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    if let Some(dt) = parse_datetime(value) {
        return Some(dt.timestamp_millis() as f64);
    }
    value.as_f64()
}

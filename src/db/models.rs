use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ID_FIELD: &str = "_id";
pub const DATE_CREATED: &str = "_created";
pub const LAST_UPDATED: &str = "_updated";
pub const ETAG: &str = "_etag";

/// Keys owned by the resource backend. They are never stored as plain fields.
pub const META_FIELDS: [&str; 4] = [ID_FIELD, DATE_CREATED, LAST_UPDATED, ETAG];

pub fn is_meta_field(key: &str) -> bool {
    META_FIELDS.contains(&key)
}

/// A document stored in a resource collection.
///
/// The meta fields are typed; everything else lives in `fields` and is
/// flattened next to them on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within the collection.
    #[serde(rename = "_id")]
    pub id: String,
    /// Creation timestamp. Never changes after insert.
    #[serde(rename = "_created")]
    pub created: DateTime<Utc>,
    /// Last-modified timestamp, bumped by every update.
    #[serde(rename = "_updated")]
    pub updated: DateTime<Utc>,
    /// Opacity tag, changes whenever the document is updated.
    #[serde(rename = "_etag")]
    pub etag: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Look up a field, following dots into nested objects (`task.desk`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        parts.try_fold(self.fields.get(first)?, |value, part| value.get(part))
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// The document as a single JSON object, meta fields included.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(ID_FIELD.into(), Value::String(self.id.clone()));
        object.insert(DATE_CREATED.into(), Value::String(self.created.to_rfc3339()));
        object.insert(LAST_UPDATED.into(), Value::String(self.updated.to_rfc3339()));
        object.insert(ETAG.into(), Value::String(self.etag.clone()));
        Value::Object(object)
    }
}

/// Parse a timestamp carried in a JSON value (RFC 3339 string).
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// A store-level query over a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Match the document id.
    Id(String),
    /// Field equals value.
    Eq(String, Value),
    /// Field is a list containing value, or equals it.
    Contains(String, Value),
    /// `_updated` is at or before the given time.
    UpdatedBefore(DateTime<Utc>),
    /// Every inner lookup matches. An empty list matches everything.
    And(Vec<Lookup>),
}

impl Lookup {
    pub fn id(id: impl Into<String>) -> Self {
        Lookup::Id(id.into())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Lookup::Eq(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Lookup::Contains(field.into(), value.into())
    }

    pub fn all() -> Self {
        Lookup::And(vec![])
    }

    /// Evaluate the lookup against a document in memory.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Lookup::Id(id) => doc.id == *id,
            Lookup::Eq(field, value) => doc.get(field) == Some(value),
            Lookup::Contains(field, value) => match doc.get(field) {
                Some(Value::Array(items)) => items.contains(value),
                Some(other) => other == value,
                None => false,
            },
            Lookup::UpdatedBefore(cutoff) => doc.updated <= *cutoff,
            Lookup::And(lookups) => lookups.iter().all(|l| l.matches(doc)),
        }
    }
}

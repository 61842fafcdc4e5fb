use async_trait::async_trait;

use crate::db::models::{Document, Lookup};
use crate::error::AppError;

/// Collection-level persistence used by the resource backend.
///
/// Implementations only store and fetch; ids, timestamps and etags are
/// assigned by the backend before documents reach the store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert new documents into a collection.
    async fn insert(&self, collection: &str, docs: &[Document]) -> Result<(), AppError>;

    /// Find the first document matching the lookup.
    async fn find_one(&self, collection: &str, lookup: &Lookup)
        -> Result<Option<Document>, AppError>;

    /// Find every document matching the lookup.
    async fn find(&self, collection: &str, lookup: &Lookup) -> Result<Vec<Document>, AppError>;

    /// Replace the stored document with the same id. Returns `false` when it
    /// does not exist.
    async fn replace(&self, collection: &str, doc: &Document) -> Result<bool, AppError>;

    /// Atomically remove one document matching the lookup and return it.
    async fn delete_one(&self, collection: &str, lookup: &Lookup)
        -> Result<Option<Document>, AppError>;
}

/// MongoDB implementation of the DocumentStore.
pub struct MongoDocumentStore {
    db: mongodb::Database,
}

impl MongoDocumentStore {
    pub fn new(db: &mongodb::Database) -> Self {
        Self { db: db.clone() }
    }

    fn collection(&self, name: &str) -> mongodb::Collection<bson::Document> {
        self.db.collection(name)
    }
}

/// Convert a document to BSON, keeping the timestamps as native dates so
/// range lookups compare chronologically.
pub fn to_bson_document(doc: &Document) -> Result<bson::Document, AppError> {
    let mut out = bson::to_document(&doc.fields).map_err(|e| AppError::Database(e.to_string()))?;
    out.insert("_id", doc.id.clone());
    out.insert("_created", bson::DateTime::from_chrono(doc.created));
    out.insert("_updated", bson::DateTime::from_chrono(doc.updated));
    out.insert("_etag", doc.etag.clone());
    Ok(out)
}

pub fn from_bson_document(mut raw: bson::Document) -> Result<Document, AppError> {
    let id = match raw.remove("_id") {
        Some(bson::Bson::String(id)) => id,
        Some(bson::Bson::ObjectId(oid)) => oid.to_hex(),
        other => {
            return Err(AppError::Database(format!("Unsupported document id: {other:?}")))
        }
    };
    let created = take_datetime(&mut raw, "_created")?;
    let updated = take_datetime(&mut raw, "_updated")?;
    let etag = match raw.remove("_etag") {
        Some(bson::Bson::String(etag)) => etag,
        _ => String::new(),
    };

    let fields = match bson::Bson::Document(raw).into_relaxed_extjson() {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    Ok(Document {
        id,
        created,
        updated,
        etag,
        fields,
    })
}

fn take_datetime(
    raw: &mut bson::Document,
    key: &str,
) -> Result<chrono::DateTime<chrono::Utc>, AppError> {
    match raw.remove(key) {
        Some(bson::Bson::DateTime(dt)) => Ok(dt.to_chrono()),
        Some(bson::Bson::String(s)) => chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| AppError::Database(format!("Invalid {key}: {e}"))),
        other => Err(AppError::Database(format!("Missing {key}: {other:?}"))),
    }
}

/// Translate a lookup into a MongoDB filter.
pub fn to_filter(lookup: &Lookup) -> Result<bson::Document, AppError> {
    use mongodb::bson::doc;

    let filter = match lookup {
        Lookup::Id(id) => doc! { "_id": id },
        // Matching an array field against a scalar is membership in MongoDB.
        Lookup::Eq(field, value) | Lookup::Contains(field, value) => {
            let value = bson::to_bson(value).map_err(|e| AppError::Database(e.to_string()))?;
            let mut filter = bson::Document::new();
            filter.insert(field.clone(), value);
            filter
        }
        Lookup::UpdatedBefore(cutoff) => {
            doc! { "_updated": { "$lte": bson::DateTime::from_chrono(*cutoff) } }
        }
        Lookup::And(lookups) if lookups.is_empty() => doc! {},
        Lookup::And(lookups) => {
            let parts = lookups
                .iter()
                .map(to_filter)
                .collect::<Result<Vec<_>, _>>()?;
            doc! { "$and": parts }
        }
    };
    Ok(filter)
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert(&self, collection: &str, docs: &[Document]) -> Result<(), AppError> {
        if docs.is_empty() {
            return Ok(());
        }
        let raw = docs
            .iter()
            .map(to_bson_document)
            .collect::<Result<Vec<_>, _>>()?;

        self.collection(collection)
            .insert_many(raw)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        lookup: &Lookup,
    ) -> Result<Option<Document>, AppError> {
        let raw = self
            .collection(collection)
            .find_one(to_filter(lookup)?)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        raw.map(from_bson_document).transpose()
    }

    async fn find(&self, collection: &str, lookup: &Lookup) -> Result<Vec<Document>, AppError> {
        use futures::TryStreamExt;

        let mut cursor = self
            .collection(collection)
            .find(to_filter(lookup)?)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut documents = Vec::new();
        while let Some(raw) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            documents.push(from_bson_document(raw)?);
        }

        Ok(documents)
    }

    async fn replace(&self, collection: &str, doc: &Document) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection(collection)
            .replace_one(doc! { "_id": &doc.id }, to_bson_document(doc)?)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.matched_count > 0)
    }

    async fn delete_one(
        &self,
        collection: &str,
        lookup: &Lookup,
    ) -> Result<Option<Document>, AppError> {
        let raw = self
            .collection(collection)
            .find_one_and_delete(to_filter(lookup)?)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        raw.map(from_bson_document).transpose()
    }
}

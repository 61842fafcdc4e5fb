use std::sync::Arc;

use crate::app::{build_macros, build_resources};
use crate::config::{AppConfig, StorageKind};
use crate::db::memory::InMemoryDocumentStore;
use crate::db::repository::{DocumentStore, MongoDocumentStore};
use crate::error::AppError;
use crate::macros::registry::MacroRegistry;
use crate::notification::NotificationBus;
use crate::resource::backend::ResourceBackend;
use crate::resource::service::Resources;
use crate::search::client::{MeilisearchIndex, SearchIndex};
use crate::search::memory::InMemorySearchIndex;
use crate::validation::{ProfileValidator, Validator};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub resources: Arc<Resources>,
    pub macros: Arc<MacroRegistry>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire storage, search and services from the configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self, AppError> {
        let (store, search) = match config.storage {
            StorageKind::Mongo => connect_mongo(&config).await?,
            StorageKind::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on shutdown");
                let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
                let search: Arc<dyn SearchIndex> = Arc::new(InMemorySearchIndex::new());
                (store, Some(search))
            }
        };

        let backend = Arc::new(ResourceBackend::new(store, search.clone(), NotificationBus::default()));
        let resources = build_resources(backend, config.timezone()?);

        if let Some(search) = &search {
            for repo in resources.searchable_repos() {
                search.configure_index(repo).await?;
            }
        }

        let validator: Arc<dyn Validator> = Arc::new(ProfileValidator::new(config.validation.clone()));

        Ok(Self {
            resources: Arc::new(resources),
            macros: Arc::new(build_macros(validator)),
            config: Arc::new(config),
        })
    }
}

async fn connect_mongo(
    config: &AppConfig,
) -> Result<(Arc<dyn DocumentStore>, Option<Arc<dyn SearchIndex>>), AppError> {
    let client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .map_err(|e| AppError::Database(format!("Failed to connect to MongoDB: {e}")))?;
    let db = client.database(&config.mongodb_database);
    tracing::info!("Connected to MongoDB at {}", config.mongodb_uri);
    let store: Arc<dyn DocumentStore> = Arc::new(MongoDocumentStore::new(&db));

    let search = match &config.meili_url {
        Some(url) => {
            let index = MeilisearchIndex::new(url, config.meili_api_key.clone())?;
            tracing::info!("Meilisearch search index at {}", url);
            Some(Arc::new(index) as Arc<dyn SearchIndex>)
        }
        None => {
            tracing::warn!("MEILI_URL not set; search is disabled");
            None
        }
    };

    Ok((store, search))
}

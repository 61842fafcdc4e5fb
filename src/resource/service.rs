use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::db::models::{Document, Lookup};
use crate::error::AppError;
use crate::notification::NotificationBus;
use crate::resource::backend::{ResourceBackend, ResourceConfig};
use crate::search::query::SearchQuery;

/// Lifecycle hooks a resource can subscribe to.
///
/// Hooks receive the registry so they can reach other resources without
/// holding references to them.
#[async_trait]
pub trait ResourceHooks: Send + Sync {
    /// Called with the built documents before they are inserted.
    async fn on_create(&self, _resources: &Resources, _docs: &mut [Document]) -> Result<(), AppError> {
        Ok(())
    }

    /// Called for each document about to be deleted.
    async fn on_delete(&self, _resources: &Resources, _doc: &Document) -> Result<(), AppError> {
        Ok(())
    }
}

/// Registry of the application's resources, all sharing one backend.
pub struct Resources {
    backend: Arc<ResourceBackend>,
    configs: HashMap<String, ResourceConfig>,
    hooks: HashMap<String, Vec<Arc<dyn ResourceHooks>>>,
}

impl Resources {
    pub fn builder(backend: Arc<ResourceBackend>) -> ResourcesBuilder {
        ResourcesBuilder {
            resources: Resources {
                backend,
                configs: HashMap::new(),
                hooks: HashMap::new(),
            },
        }
    }

    /// Resolve a resource by name.
    pub fn service(&self, name: &str) -> Result<ResourceService<'_>, AppError> {
        let config = self
            .configs
            .get(name)
            .ok_or_else(|| AppError::Internal(format!("Unknown resource '{name}'")))?;
        Ok(ResourceService {
            resources: self,
            config,
        })
    }

    pub fn backend(&self) -> &ResourceBackend {
        &self.backend
    }

    pub fn bus(&self) -> &NotificationBus {
        self.backend.bus()
    }

    /// Datasource names of every searchable resource.
    pub fn searchable_repos(&self) -> Vec<&str> {
        self.configs
            .values()
            .filter(|c| c.searchable)
            .map(|c| c.datasource.as_str())
            .collect()
    }

    /// Search across the datasources of the named resources.
    pub async fn search(
        &self,
        resources: &[&str],
        query: &SearchQuery,
    ) -> Result<Vec<Document>, AppError> {
        let repos = resources
            .iter()
            .map(|name| self.service(name).map(|s| s.config.datasource.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        self.backend.search(&repos, query).await
    }

    fn hooks(&self, name: &str) -> &[Arc<dyn ResourceHooks>] {
        self.hooks.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

pub struct ResourcesBuilder {
    resources: Resources,
}

impl ResourcesBuilder {
    pub fn register(mut self, config: ResourceConfig) -> Self {
        self.resources.configs.insert(config.name.clone(), config);
        self
    }

    pub fn hook(mut self, name: &str, hooks: Arc<dyn ResourceHooks>) -> Self {
        self.resources
            .hooks
            .entry(name.to_string())
            .or_default()
            .push(hooks);
        self
    }

    pub fn build(self) -> Resources {
        self.resources
    }
}

/// A resource bound to its configuration and hooks.
#[derive(Clone, Copy)]
pub struct ResourceService<'a> {
    resources: &'a Resources,
    config: &'a ResourceConfig,
}

impl<'a> ResourceService<'a> {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ResourceConfig {
        self.config
    }

    pub async fn create(&self, items: Vec<Map<String, Value>>) -> Result<Vec<String>, AppError> {
        let backend = self.resources.backend();
        let mut docs: Vec<Document> = items.into_iter().map(|f| backend.build_document(f)).collect();
        for hooks in self.resources.hooks(&self.config.name) {
            hooks.on_create(self.resources, &mut docs).await?;
        }
        backend.insert(self.config, docs).await
    }

    pub async fn find_one(&self, lookup: &Lookup) -> Result<Option<Document>, AppError> {
        self.resources.backend().find_one(self.config, lookup).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Document>, AppError> {
        self.find_one(&Lookup::id(id)).await
    }

    pub async fn find(&self, lookup: &Lookup) -> Result<Vec<Document>, AppError> {
        self.resources.backend().find(self.config, lookup).await
    }

    /// Update a document the caller already loaded.
    pub async fn update(
        &self,
        id: &str,
        updates: Map<String, Value>,
        original: &Document,
    ) -> Result<Document, AppError> {
        self.resources
            .backend()
            .update(self.config, id, &updates, &original.fields)
            .await
    }

    /// Delete every document matching the lookup, running delete hooks first.
    pub async fn delete(&self, lookup: &Lookup) -> Result<Vec<Document>, AppError> {
        let hooks = self.resources.hooks(&self.config.name);
        if !hooks.is_empty() {
            for doc in self.find(lookup).await? {
                for hook in hooks {
                    hook.on_delete(self.resources, &doc).await?;
                }
            }
        }
        self.resources.backend().delete(self.config, lookup).await
    }

    /// Search this resource's own datasource.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Document>, AppError> {
        self.resources
            .backend()
            .search(&[self.config.datasource.as_str()], query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryDocumentStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHooks {
        created: AtomicUsize,
        deleted: AtomicUsize,
    }

    #[async_trait]
    impl ResourceHooks for CountingHooks {
        async fn on_create(&self, _resources: &Resources, docs: &mut [Document]) -> Result<(), AppError> {
            for doc in docs.iter_mut() {
                doc.fields.insert("stamped".into(), json!(true));
            }
            self.created.fetch_add(docs.len(), Ordering::SeqCst);
            Ok(())
        }

        async fn on_delete(&self, _resources: &Resources, _doc: &Document) -> Result<(), AppError> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn resources(hooks: Arc<CountingHooks>) -> Resources {
        let backend = Arc::new(ResourceBackend::new(
            Arc::new(InMemoryDocumentStore::new()),
            None,
            NotificationBus::default(),
        ));
        Resources::builder(backend)
            .register(ResourceConfig::new("highlights"))
            .register(ResourceConfig::new("auth").datasource("sessions"))
            .hook("highlights", hooks)
            .build()
    }

    #[tokio::test]
    async fn test_hooks_run_on_create_and_delete() {
        let hooks = Arc::new(CountingHooks {
            created: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        });
        let resources = resources(hooks.clone());
        let highlights = resources.service("highlights").unwrap();

        let ids = highlights
            .create(vec![json!({"name": "Top"}).as_object().unwrap().clone()])
            .await
            .unwrap();
        let doc = highlights.find_by_id(&ids[0]).await.unwrap().unwrap();
        assert_eq!(doc.fields["stamped"], true);

        highlights.delete(&Lookup::id(&ids[0])).await.unwrap();
        assert_eq!(hooks.created.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.deleted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let hooks = Arc::new(CountingHooks {
            created: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        });
        let resources = resources(hooks);
        assert!(resources.service("nope").is_err());
        assert_eq!(resources.service("auth").unwrap().config().datasource, "sessions");
    }

    #[tokio::test]
    async fn test_search_without_index_fails() {
        let hooks = Arc::new(CountingHooks {
            created: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        });
        let resources = resources(hooks);
        let query = SearchQuery {
            filter: vec![],
            sort: vec![],
            size: 10,
        };
        assert!(matches!(
            resources.search(&["highlights"], &query).await,
            Err(AppError::Search(_))
        ));
    }
}

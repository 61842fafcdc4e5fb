#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use chrono::{FixedOffset, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;

use newsdesk::app::{build_macros, build_resources, router};
use newsdesk::auth::sessions::{create_session, USERS};
use newsdesk::config::{AppConfig, StorageKind};
use newsdesk::db::memory::InMemoryDocumentStore;
use newsdesk::notification::{Notification, NotificationBus};
use newsdesk::resource::backend::ResourceBackend;
use newsdesk::resource::service::Resources;
use newsdesk::search::client::SearchIndex;
use newsdesk::search::memory::InMemorySearchIndex;
use newsdesk::state::AppState;
use newsdesk::validation::{ProfileValidator, ValidationRule};

/// In-memory application wired the same way as the server.
pub struct TestEnv {
    pub state: AppState,
    pub router: Router,
    pub search: Arc<InMemorySearchIndex>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        storage: StorageKind::Memory,
        mongodb_uri: String::new(),
        mongodb_database: String::new(),
        meili_url: None,
        meili_api_key: None,
        listen_addr: "127.0.0.1:0".into(),
        session_expiry_minutes: 240,
        session_purge_interval_secs: 60,
        default_timezone_offset_minutes: 0,
        validation: vec![ValidationRule::new("publish", "text", &["headline", "slugline"])],
    }
}

impl TestEnv {
    pub fn start() -> Self {
        let config = test_config();
        let search = Arc::new(InMemorySearchIndex::new());
        let backend = Arc::new(ResourceBackend::new(
            Arc::new(InMemoryDocumentStore::new()),
            Some(search.clone() as Arc<dyn SearchIndex>),
            NotificationBus::default(),
        ));
        let resources = build_resources(backend, FixedOffset::east_opt(0).unwrap());
        let validator = Arc::new(ProfileValidator::new(config.validation.clone()));

        let state = AppState {
            resources: Arc::new(resources),
            macros: Arc::new(build_macros(validator)),
            config: Arc::new(config),
        };
        let router = router(state.clone());
        Self {
            state,
            router,
            search,
        }
    }

    pub fn resources(&self) -> &Resources {
        &self.state.resources
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.resources().bus().subscribe()
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .build(self.router.clone())
    }

    /// Helper: create a document in a resource with the given fields.
    pub async fn seed(&self, resource: &str, fields: Value) -> String {
        let fields: Map<String, Value> = fields.as_object().cloned().expect("object fields");
        self.resources()
            .service(resource)
            .expect("registered resource")
            .create(vec![fields])
            .await
            .expect("Failed to seed document")
            .remove(0)
    }

    /// Helper: an archive item created now.
    pub async fn seed_item(&self, id: &str, extra: Value) -> String {
        let mut fields = json!({
            "_id": id,
            "type": "text",
            "headline": format!("Headline {id}"),
            "versioncreated": Utc::now().to_rfc3339(),
        });
        if let (Some(fields), Some(extra)) = (fields.as_object_mut(), extra.as_object()) {
            fields.extend(extra.clone());
        }
        self.seed("archive", fields).await
    }

    /// Helper: a user plus a session; returns the session token.
    pub async fn login(&self, user_id: &str, user_type: &str) -> String {
        let existing = self
            .resources()
            .service(USERS)
            .unwrap()
            .find_by_id(user_id)
            .await
            .unwrap();
        if existing.is_none() {
            self.seed(
                USERS,
                json!({"_id": user_id, "username": user_id, "user_type": user_type}),
            )
            .await;
        }
        let (_, token) = create_session(self.resources(), user_id).await.unwrap();
        token
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

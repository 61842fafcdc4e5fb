use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use chrono::FixedOffset;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::sessions::{SESSIONS, USERS};
use crate::highlights::service::{
    HighlightCleanupHooks, PackageHighlightHooks, ARCHIVE, DESKS, HIGHLIGHTS, PUBLISHED,
};
use crate::macros::registry::MacroRegistry;
use crate::macros::validate_for_publish::ValidateForPublish;
use crate::resource::backend::{ResourceBackend, ResourceConfig};
use crate::resource::service::Resources;
use crate::state::AppState;
use crate::validation::Validator;

/// Register the newsroom resources and their hooks.
pub fn build_resources(backend: Arc<ResourceBackend>, tz: FixedOffset) -> Resources {
    Resources::builder(backend)
        .register(ResourceConfig::new(ARCHIVE).searchable())
        .register(ResourceConfig::new(PUBLISHED).searchable())
        .register(ResourceConfig::new(HIGHLIGHTS))
        .register(ResourceConfig::new(DESKS))
        .register(ResourceConfig::new(USERS))
        .register(ResourceConfig::new(SESSIONS).datasource("sessions"))
        .hook(ARCHIVE, Arc::new(PackageHighlightHooks::new(tz)))
        .hook(HIGHLIGHTS, Arc::new(HighlightCleanupHooks))
        .build()
}

pub fn build_macros(validator: Arc<dyn Validator>) -> MacroRegistry {
    MacroRegistry::new().register(Arc::new(ValidateForPublish::new(validator)))
}

/// The HTTP API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/marked_for_highlights",
            post(api::highlights::mark_for_highlights_handler),
        )
        .route(
            "/api/highlights/{id}",
            delete(api::highlights::delete_highlight_handler),
        )
        .route(
            "/api/highlights/{id}/items",
            get(api::highlights::highlighted_items_handler),
        )
        .route(
            "/api/clear_sessions/{user_id}",
            delete(api::sessions::clear_sessions_handler),
        )
        .route(
            "/api/auth/session",
            get(api::sessions::current_session_handler).delete(api::sessions::logout_handler),
        )
        .route(
            "/api/macros",
            get(api::macros::list_macros_handler).post(api::macros::run_macro_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::context::RequestContext;
use crate::error::AppError;
use crate::macros::registry::MacroDescriptor;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MacroRequest {
    /// Name of the macro to run.
    #[serde(rename = "macro")]
    pub name: String,
    /// The item the macro runs on.
    pub item: Map<String, Value>,
}

/// `GET /api/macros`: list available macros.
pub async fn list_macros_handler(State(state): State<AppState>) -> Json<Vec<MacroDescriptor>> {
    Json(state.macros.descriptors().into_iter().cloned().collect())
}

/// `POST /api/macros`: run a macro on an item.
pub async fn run_macro_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<MacroRequest>,
) -> Result<Json<Map<String, Value>>, AppError> {
    ctx.get_user(true)?;
    let item = state
        .macros
        .execute(&request.name, &state.resources, request.item)
        .await?;
    Ok(Json(item))
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::auth::context::RequestContext;
use crate::db::models::{Document, Lookup};
use crate::error::AppError;
use crate::highlights::service::{
    get_highlighted_items, toggle_highlights, MarkForHighlights, HIGHLIGHTS,
};
use crate::state::AppState;

/// `POST /api/marked_for_highlights`: toggle highlights on items.
///
/// Responds with one entry per request: the item id, or `null` when the
/// item was not found.
pub async fn mark_for_highlights_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(requests): Json<Vec<MarkForHighlights>>,
) -> Result<(StatusCode, Json<Vec<Option<String>>>), AppError> {
    ctx.get_user(true)?;
    let ids = toggle_highlights(&state.resources, &requests).await?;
    Ok((StatusCode::CREATED, Json(ids)))
}

/// `GET /api/highlights/{id}/items`: items currently in a highlight.
pub async fn highlighted_items_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Document>>, AppError> {
    let tz = state.config.timezone()?;
    let items = get_highlighted_items(&state.resources, &id, tz).await?;
    Ok(Json(items))
}

/// `DELETE /api/highlights/{id}`: delete a highlight and unmark its items.
pub async fn delete_highlight_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.get_user(true)?;
    let removed = state
        .resources
        .service(HIGHLIGHTS)?
        .delete(&Lookup::id(id.clone()))
        .await?;
    if removed.is_empty() {
        return Err(AppError::NotFound(format!("highlight '{id}'")));
    }
    Ok(StatusCode::NO_CONTENT)
}

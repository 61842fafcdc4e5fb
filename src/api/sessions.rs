use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use crate::auth::context::RequestContext;
use crate::auth::models::Session;
use crate::auth::sessions::{clear_sessions, logout};
use crate::error::AppError;
use crate::state::AppState;

/// `DELETE /api/clear_sessions/{user_id}`: end a user's other sessions.
///
/// Users may clear their own sessions; administrators anyone's.
pub async fn clear_sessions_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let own = ctx.get_user_id(true)? == Some(user_id.as_str());
    if !own && !ctx.is_current_user_admin(true)? {
        return Err(AppError::Forbidden("Cannot clear sessions of another user".into()));
    }
    let result = clear_sessions(&state.resources, &ctx, &user_id).await?;
    Ok(Json(result))
}

/// `GET /api/auth/session`: the caller's session.
pub async fn current_session_handler(ctx: RequestContext) -> Result<Json<Session>, AppError> {
    ctx.get_auth()
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::Auth("Not logged in".into()))
}

/// `DELETE /api/auth/session`: log out.
pub async fn logout_handler(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<StatusCode, AppError> {
    logout(&state.resources, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

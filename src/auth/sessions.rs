use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::auth::context::RequestContext;
use crate::auth::models::{AuthenticatedUser, Session};
use crate::db::models::Lookup;
use crate::error::AppError;
use crate::resource::service::Resources;

/// Resource holding sessions.
pub const SESSIONS: &str = "auth";
/// Resource holding user accounts.
pub const USERS: &str = "users";

/// A fresh random bearer token.
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

/// Hex SHA-256 of a token, the form in which tokens are stored.
pub fn hash_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Open a session for a user. Returns the session and its raw token, which
/// is not recoverable afterwards.
pub async fn create_session(
    resources: &Resources,
    user_id: &str,
) -> Result<(Session, String), AppError> {
    let token = generate_token();
    let mut fields = Map::new();
    fields.insert("user".into(), Value::String(user_id.to_string()));
    fields.insert("token_hash".into(), Value::String(hash_token(&token)));

    let sessions = resources.service(SESSIONS)?;
    let ids = sessions.create(vec![fields]).await?;
    let id = ids
        .first()
        .ok_or_else(|| AppError::Internal("session was not created".into()))?;
    let doc = sessions
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("session '{id}' vanished")))?;

    tracing::info!(user = %user_id, session = %doc.id, "session created");
    Ok((Session::from_document(&doc)?, token))
}

/// Resolve a bearer token into a request context.
///
/// The session's last activity is bumped, which keeps it from expiring.
pub async fn authenticate(resources: &Resources, token: &str) -> Result<RequestContext, AppError> {
    let sessions = resources.service(SESSIONS)?;
    let doc = sessions
        .find_one(&Lookup::eq("token_hash", hash_token(token)))
        .await?
        .ok_or_else(|| AppError::Auth("Invalid token".into()))?;

    let touched = sessions.update(&doc.id, Map::new(), &doc).await?;
    let session = Session::from_document(&touched)?;

    let user = resources
        .service(USERS)?
        .find_by_id(&session.user)
        .await?
        .ok_or_else(|| AppError::Auth("Session user no longer exists".into()))?;

    Ok(RequestContext::authenticated(
        AuthenticatedUser::from_document(&user),
        session,
    ))
}

/// Delete every session of a user except the one making the request.
pub async fn clear_sessions(
    resources: &Resources,
    ctx: &RequestContext,
    user_id: &str,
) -> Result<Value, AppError> {
    let current = ctx.get_auth().map(|s| s.id.as_str());
    let sessions = resources.service(SESSIONS)?;

    let mut cleared = 0;
    for session in sessions.find(&Lookup::eq("user", user_id)).await? {
        if Some(session.id.as_str()) == current {
            continue;
        }
        cleared += sessions.delete(&Lookup::id(session.id)).await?.len();
    }

    tracing::info!(user = %user_id, cleared, "cleared user sessions");
    Ok(json!({ "complete": true }))
}

/// Close the request's own session.
pub async fn logout(resources: &Resources, ctx: &RequestContext) -> Result<(), AppError> {
    let session = ctx
        .get_auth()
        .ok_or_else(|| AppError::Auth("Not logged in".into()))?;
    resources
        .service(SESSIONS)?
        .delete(&Lookup::And(vec![
            Lookup::id(session.id.clone()),
            Lookup::eq("user", session.user.clone()),
        ]))
        .await?;
    Ok(())
}

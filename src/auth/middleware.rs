use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::auth::context::RequestContext;
use crate::auth::sessions::authenticate;
use crate::error::AppError;
use crate::state::AppState;

/// Extract the session token from the `Authorization` header.
///
/// Accepts `Bearer <token>` and `Basic base64(<token>:)`. A missing header
/// yields `None`; a malformed one is an authentication error.
pub fn extract_token(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::Auth("Malformed Authorization header".into()))?;

    let (scheme, credentials) = value
        .split_once(' ')
        .ok_or_else(|| AppError::Auth("Malformed Authorization header".into()))?;
    let credentials = credentials.trim();

    match scheme.to_ascii_lowercase().as_str() {
        "bearer" if !credentials.is_empty() => Ok(Some(credentials.to_string())),
        "basic" => {
            let decoded = STANDARD
                .decode(credentials)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(|| AppError::Auth("Malformed basic credentials".into()))?;
            let token = decoded.split(':').next().unwrap_or_default();
            if token.is_empty() {
                return Err(AppError::Auth("Empty token".into()));
            }
            Ok(Some(token.to_string()))
        }
        _ => Err(AppError::Auth(format!("Unsupported authorization scheme '{scheme}'"))),
    }
}

/// Builds the request context from the session token, if one is sent.
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match extract_token(&parts.headers)? {
            Some(token) => authenticate(&state.resources, &token).await,
            None => Ok(RequestContext::anonymous()),
        }
    }
}

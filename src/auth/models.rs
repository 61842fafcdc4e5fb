use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::models::Document;
use crate::error::AppError;

/// Kind of user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Administrator,
    #[default]
    User,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Administrator => write!(f, "administrator"),
            UserType::User => write!(f, "user"),
        }
    }
}

/// The user behind an authenticated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(rename = "_id")]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub user_type: UserType,
}

impl AuthenticatedUser {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            user_id: doc.id.clone(),
            username: doc.get_str("username").unwrap_or_default().to_string(),
            email: doc.get_str("email").unwrap_or_default().to_string(),
            user_type: doc
                .get("user_type")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Administrator
    }
}

/// An authenticated session, stored in the `sessions` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: String,
    /// Id of the user owning the session.
    pub user: String,
    /// SHA-256 of the bearer token; the token itself is never stored.
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    #[serde(rename = "_created")]
    pub created: DateTime<Utc>,
    /// Last activity. Sessions expire relative to this.
    #[serde(rename = "_updated")]
    pub updated: DateTime<Utc>,
}

impl Session {
    pub fn from_document(doc: &Document) -> Result<Self, AppError> {
        let user = doc
            .get_str("user")
            .ok_or_else(|| AppError::Database(format!("session '{}' has no user", doc.id)))?;
        Ok(Self {
            id: doc.id.clone(),
            user: user.to_string(),
            token_hash: doc.get_str("token_hash").unwrap_or_default().to_string(),
            created: doc.created,
            updated: doc.updated,
        })
    }

    /// Cutoff at or before which a session's last activity counts as expired.
    ///
    /// Saturates at the earliest representable time, so an expiry window
    /// reaching past it expires nothing.
    pub fn expiry_cutoff(now: DateTime<Utc>, expiry: Duration) -> DateTime<Utc> {
        now.checked_sub_signed(expiry).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

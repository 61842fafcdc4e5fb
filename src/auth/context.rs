use crate::auth::models::{AuthenticatedUser, Session};
use crate::error::AppError;

/// Per-request user and session data, passed explicitly down call chains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub user: Option<AuthenticatedUser>,
    pub auth: Option<Session>,
}

impl RequestContext {
    /// A context without user or session (background tasks, CLI).
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: AuthenticatedUser, session: Session) -> Self {
        Self {
            user: Some(user),
            auth: Some(session),
        }
    }

    /// Get the user authenticated for this request.
    ///
    /// When `required` is set and there is no user, fails with `NotFound`;
    /// otherwise an absent user is returned silently.
    pub fn get_user(&self, required: bool) -> Result<Option<&AuthenticatedUser>, AppError> {
        match &self.user {
            None if required => Err(AppError::NotFound("Invalid user.".into())),
            user => Ok(user.as_ref()),
        }
    }

    pub fn get_user_id(&self, required: bool) -> Result<Option<&str>, AppError> {
        Ok(self.get_user(required)?.map(|u| u.user_id.as_str()))
    }

    /// Session data of this request, if any.
    pub fn get_auth(&self) -> Option<&Session> {
        self.auth.as_ref()
    }

    pub fn is_current_user_admin(&self, required: bool) -> Result<bool, AppError> {
        Ok(self.get_user(required)?.is_some_and(AuthenticatedUser::is_admin))
    }
}

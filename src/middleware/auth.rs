use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{ROLE_ADMIN, SessionUser},
    services::session_service,
    state::AppState,
};

/// Identity resolved from the bearer token. Fields come from the session
/// snapshot taken at login, not from the live user row.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub token: String,
}

impl AuthUser {
    pub fn new(identity: SessionUser, token: String) -> Self {
        Self {
            user_id: identity.id,
            username: identity.username,
            display_name: identity.display_name,
            role: identity.role,
            token,
        }
    }

    pub fn identity(&self) -> SessionUser {
        SessionUser {
            id: self.user_id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role.clone(),
        }
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_ADMIN)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let state = AppState::from_ref(state);
        let identity = session_service::resolve(&state.orm, &token).await?;
        Ok(AuthUser::new(identity, token))
    }
}

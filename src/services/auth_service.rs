use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use std::sync::LazyLock;

use chrono::Utc;
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    config::AdminCredentials,
    dto::auth::{LoginRequest, LoginResponse},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ROLE_ADMIN, SessionUser},
    response::{ApiResponse, Meta},
    services::{session_service, user_service::user_from_entity},
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

/// Unparseable hashes (e.g. rows written by older tooling) never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Stand-in verified when there is no usable stored hash.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-account").ok());

/// Every call costs one argon2 verification, whether or not an account with a
/// usable hash exists, so response time does not reveal known usernames.
pub(crate) fn check_credentials(password: &str, stored_hash: Option<&str>) -> bool {
    if let Some(hash) = stored_hash.filter(|h| PasswordHash::new(h).is_ok()) {
        return verify_password(password, hash);
    }
    if let Some(dummy) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, dummy);
    }
    false
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { username, password } = payload;
    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Username and password required".into()));
    }

    let user = Users::find()
        .filter(UserCol::Username.eq(username.trim()))
        .filter(UserCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;

    let verified = check_credentials(&password, user.as_ref().map(|u| u.password_hash.as_str()));
    let user = match user {
        Some(u) if verified => user_from_entity(u),
        _ => {
            tracing::info!(username = %username, "login rejected");
            return Err(AppError::InvalidCredentials);
        }
    };

    let identity = SessionUser::from(&user);
    let token = session_service::create_session(&state.orm, &identity).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token,
            user: identity,
        },
        Some(Meta::empty()),
    ))
}

pub async fn logout(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<serde_json::Value>> {
    session_service::revoke(&state.orm, &user.token).await?;
    tracing::info!(user_id = %user.user_id, "user logged out");
    Ok(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn me(user: &AuthUser) -> ApiResponse<SessionUser> {
    ApiResponse::success("Ok", user.identity(), Some(Meta::empty()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminReconciliation {
    Created,
    Updated {
        role_fixed: bool,
        password_updated: bool,
        reactivated: bool,
    },
    Unchanged,
}

/// Make the stored admin account match the externally supplied credentials.
/// Safe to run on every start.
pub async fn reconcile_admin<C: ConnectionTrait>(
    db: &C,
    credentials: &AdminCredentials,
) -> AppResult<AdminReconciliation> {
    let existing = Users::find()
        .filter(UserCol::Username.eq(credentials.username.as_str()))
        .one(db)
        .await?;

    let Some(existing) = existing else {
        UserActive {
            id: Set(Uuid::new_v4()),
            username: Set(credentials.username.clone()),
            password_hash: Set(hash_password(&credentials.password)?),
            display_name: Set("Administrator".into()),
            role: Set(ROLE_ADMIN.into()),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await?;
        tracing::info!(username = %credentials.username, "created admin user from configuration");
        return Ok(AdminReconciliation::Created);
    };

    let role_fixed = existing.role != ROLE_ADMIN;
    let password_updated = !verify_password(&credentials.password, &existing.password_hash);
    let reactivated = !existing.is_active;
    if !role_fixed && !password_updated && !reactivated {
        return Ok(AdminReconciliation::Unchanged);
    }

    let mut active: UserActive = existing.into();
    if role_fixed {
        active.role = Set(ROLE_ADMIN.into());
        tracing::warn!(username = %credentials.username, "admin role had drifted, restored");
    }
    if password_updated {
        active.password_hash = Set(hash_password(&credentials.password)?);
        tracing::info!(username = %credentials.username, "admin password updated from configuration");
    }
    if reactivated {
        active.is_active = Set(true);
        tracing::warn!(username = %credentials.username, "admin account was inactive, reactivated");
    }
    active.update(db).await?;

    Ok(AdminReconciliation::Updated {
        role_fixed,
        password_updated,
        reactivated,
    })
}

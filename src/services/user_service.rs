use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, EntityTrait, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::users::{CreateUserRequest, UpdateUserRequest, UserList},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{ROLE_CASHIER, User, is_valid_role},
    response::{ApiResponse, Meta},
    services::{auth_service::hash_password, session_service},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;

pub async fn list_users(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let items: Vec<User> = Users::find()
        .order_by_asc(UserCol::Username)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    let meta = Meta::listing(items.len());
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn get_user(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let found = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(user_from_entity)
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(ApiResponse::success("User", found, Some(Meta::empty())))
}

pub async fn create_user(
    state: &AppState,
    user: &AuthUser,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let username = payload.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }
    validate_password(&payload.password)?;
    let role = payload.role.unwrap_or_else(|| ROLE_CASHIER.to_string());
    validate_role(&role)?;
    let display_name = payload
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| username.clone());

    let created = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        password_hash: Set(hash_password(&payload.password)?),
        display_name: Set(display_name),
        role: Set(role),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await
    .map_err(|e| AppError::from(e).classify("Username already exists"))?;

    tracing::info!(user_id = %created.id, by = %user.user_id, "user created");
    Ok(ApiResponse::success(
        "User created",
        user_from_entity(created),
        Some(Meta::empty()),
    ))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    if id == user.user_id && payload.is_active == Some(false) {
        return Err(AppError::BadRequest("You cannot deactivate your own account".into()));
    }
    if let Some(role) = payload.role.as_deref() {
        validate_role(role)?;
    }
    if let Some(password) = payload.password.as_deref() {
        validate_password(password)?;
    }

    let txn = state.orm.begin().await?;
    let existing = Users::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut active: UserActive = existing.into();
    if let Some(display_name) = payload.display_name.map(|n| n.trim().to_string()) {
        if display_name.is_empty() {
            return Err(AppError::BadRequest("Display name must not be empty".into()));
        }
        active.display_name = Set(display_name);
    }
    if let Some(role) = payload.role {
        active.role = Set(role);
    }
    if let Some(password) = payload.password.as_deref() {
        active.password_hash = Set(hash_password(password)?);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let updated = active.update(&txn).await?;

    if !updated.is_active {
        let revoked = session_service::revoke_user_sessions(&txn, updated.id).await?;
        tracing::info!(user_id = %updated.id, revoked, "user deactivated");
    }
    txn.commit().await?;

    Ok(ApiResponse::success(
        "User updated",
        user_from_entity(updated),
        Some(Meta::empty()),
    ))
}

/// Sessions go with the account (FK cascade); sales keep their rows with the
/// cashier reference cleared.
pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if id == user.user_id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }

    let result = Users::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("User"));
    }

    tracing::info!(user_id = %id, by = %user.user_id, "user deleted");
    Ok(ApiResponse::success(
        "User deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_role(role: &str) -> AppResult<()> {
    if is_valid_role(role) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Role must be admin or cashier".into()))
    }
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        username: model.username,
        display_name: model.display_name,
        role: model.role,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_roles_pass() {
        assert!(validate_role("admin").is_ok());
        assert!(validate_role("cashier").is_ok());
        assert!(matches!(validate_role("manager"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}

//! Durable bearer-token sessions.
//!
//! Tokens are 32 random bytes, hex encoded, handed to the client once. Only
//! their SHA-256 digest is stored. Expiry is enforced when a token is
//! resolved; expired rows may linger until [`purge_expired`] runs but are
//! never accepted.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    entity::sessions::{ActiveModel as SessionActive, Column as SessionCol, Entity as Sessions},
    error::{AppError, AppResult},
    models::SessionUser,
};

pub const SESSION_TTL_DAYS: i64 = 7;

pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A session is live when it has no expiry or its expiry is strictly after `now`.
pub fn is_live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        None => true,
        Some(expires_at) => expires_at > now,
    }
}

pub async fn create_session<C: ConnectionTrait>(db: &C, user: &SessionUser) -> AppResult<String> {
    create_session_at(db, user, Utc::now()).await
}

pub async fn create_session_at<C: ConnectionTrait>(
    db: &C,
    user: &SessionUser,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let token = generate_token();
    let snapshot = serde_json::to_value(user)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("session snapshot: {e}")))?;

    SessionActive {
        token_hash: Set(hash_token(&token)),
        user_id: Set(user.id),
        user_snapshot: Set(snapshot),
        expires_at: Set(Some((now + Duration::days(SESSION_TTL_DAYS)).into())),
        created_at: Set(now.into()),
    }
    .insert(db)
    .await?;

    tracing::debug!(user_id = %user.id, "session created");
    Ok(token)
}

pub async fn resolve<C: ConnectionTrait>(db: &C, token: &str) -> AppResult<SessionUser> {
    resolve_at(db, token, Utc::now()).await
}

/// Missing, expired and unreadable sessions are indistinguishable to the caller.
pub async fn resolve_at<C: ConnectionTrait>(
    db: &C,
    token: &str,
    now: DateTime<Utc>,
) -> AppResult<SessionUser> {
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let session = Sessions::find_by_id(hash_token(token))
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let expires_at = session.expires_at.map(|dt| dt.with_timezone(&Utc));
    if !is_live(expires_at, now) {
        return Err(AppError::Unauthorized);
    }

    serde_json::from_value(session.user_snapshot).map_err(|err| {
        tracing::warn!(user_id = %session.user_id, error = %err, "unreadable session snapshot");
        AppError::Unauthorized
    })
}

pub async fn revoke<C: ConnectionTrait>(db: &C, token: &str) -> AppResult<()> {
    Sessions::delete_by_id(hash_token(token)).exec(db).await?;
    Ok(())
}

pub async fn revoke_user_sessions<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<u64> {
    let result = Sessions::delete_many()
        .filter(SessionCol::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn purge_expired<C: ConnectionTrait>(db: &C, now: DateTime<Utc>) -> AppResult<u64> {
    let result = Sessions::delete_many()
        .filter(SessionCol::ExpiresAt.lte(now))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        tracing::info!(count = result.rows_affected, "purged expired sessions");
    }
    Ok(result.rows_affected)
}

mod common;

use chrono::{Duration, Utc};
use pos_server::{
    dto::auth::LoginRequest,
    error::AppError,
    services::{auth_service, session_service},
};

use common::{TEST_PASSWORD, create_cashier, setup_state};

#[tokio::test]
async fn session_resolves_until_it_expires() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let cashier = create_cashier(&state).await?;
    let issued_at = Utc::now();
    let token = session_service::create_session_at(&state.orm, &cashier.identity(), issued_at).await?;

    let identity = session_service::resolve(&state.orm, &token).await?;
    assert_eq!(identity, cashier.identity());

    let just_before = issued_at + Duration::days(session_service::SESSION_TTL_DAYS) - Duration::seconds(1);
    assert!(session_service::resolve_at(&state.orm, &token, just_before).await.is_ok());

    let after = issued_at + Duration::days(session_service::SESSION_TTL_DAYS) + Duration::seconds(1);
    let expired = session_service::resolve_at(&state.orm, &token, after).await;
    assert!(matches!(expired, Err(AppError::Unauthorized)));
    Ok(())
}

#[tokio::test]
async fn unknown_and_revoked_tokens_are_unauthorized() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let cashier = create_cashier(&state).await?;

    let unknown = session_service::resolve(&state.orm, &session_service::generate_token()).await;
    assert!(matches!(unknown, Err(AppError::Unauthorized)));

    session_service::revoke(&state.orm, &cashier.token).await?;
    let revoked = session_service::resolve(&state.orm, &cashier.token).await;
    assert!(matches!(revoked, Err(AppError::Unauthorized)));

    // Revoking twice is harmless.
    session_service::revoke(&state.orm, &cashier.token).await?;
    Ok(())
}

#[tokio::test]
async fn purge_removes_only_expired_sessions() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let cashier = create_cashier(&state).await?;
    let stale = session_service::create_session_at(
        &state.orm,
        &cashier.identity(),
        Utc::now() - Duration::days(session_service::SESSION_TTL_DAYS + 1),
    )
    .await?;

    let purged = session_service::purge_expired(&state.orm, Utc::now()).await?;
    assert!(purged >= 1);

    let stale_hash = session_service::hash_token(&stale);
    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE token_hash = $1")
        .bind(stale_hash)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(remaining, 0);
    assert!(session_service::resolve(&state.orm, &cashier.token).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn login_then_logout_round_trip() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let cashier = create_cashier(&state).await?;

    let wrong = auth_service::login(
        &state,
        LoginRequest {
            username: cashier.username.clone(),
            password: "not-the-password".into(),
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::InvalidCredentials)));

    let unknown = auth_service::login(
        &state,
        LoginRequest {
            username: common::unique("nobody"),
            password: TEST_PASSWORD.into(),
        },
    )
    .await;
    assert!(matches!(unknown, Err(AppError::InvalidCredentials)));

    let login = auth_service::login(
        &state,
        LoginRequest {
            username: cashier.username.clone(),
            password: TEST_PASSWORD.into(),
        },
    )
    .await?
    .data
    .expect("login");
    assert_eq!(login.user.id, cashier.user_id);
    assert_eq!(login.token.len(), 64);

    let resolved = session_service::resolve(&state.orm, &login.token).await?;
    let session_user = pos_server::middleware::auth::AuthUser::new(resolved, login.token.clone());
    auth_service::logout(&state, &session_user).await?;

    let after = session_service::resolve(&state.orm, &login.token).await;
    assert!(matches!(after, Err(AppError::Unauthorized)));
    Ok(())
}

#[tokio::test]
async fn missing_credentials_are_a_bad_request() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let result = auth_service::login(
        &state,
        LoginRequest {
            username: String::new(),
            password: String::new(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    Ok(())
}

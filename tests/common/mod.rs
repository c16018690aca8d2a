#![allow(dead_code)]

use chrono::Utc;
use pos_server::{
    config::{AdminCredentials, AppConfig},
    db::{create_pool, run_migrations},
    dto::products::CreateProductRequest,
    entity::users::ActiveModel as UserActive,
    middleware::auth::AuthUser,
    models::{Product, ROLE_ADMIN, ROLE_CASHIER, SessionUser},
    services::{auth_service::hash_password, product_service, session_service},
    state::AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::OnceCell;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "secret-pass";

static MIGRATED: OnceCell<()> = OnceCell::const_new();

pub fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

/// Returns `None` when no database is configured so callers can skip.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let Some(database_url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(None);
    };

    let config = test_config(&database_url);
    let pool = create_pool(&database_url, config.max_connections).await?;
    let state = AppState::new(pool, config);

    MIGRATED
        .get_or_try_init(|| async { run_migrations(&state.orm).await })
        .await?;

    Ok(Some(state))
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        max_connections: 16,
        timezone: "UTC".into(),
        admin: AdminCredentials {
            username: unique("admin"),
            password: TEST_PASSWORD.into(),
        },
    }
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

pub async fn create_user(state: &AppState, role: &str) -> anyhow::Result<AuthUser> {
    let username = unique(role);
    let model = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username.clone()),
        password_hash: Set(hash_password(TEST_PASSWORD)?),
        display_name: Set(format!("Test {role}")),
        role: Set(role.to_string()),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    let identity = SessionUser {
        id: model.id,
        username,
        display_name: model.display_name,
        role: model.role,
    };
    let token = session_service::create_session(&state.orm, &identity).await?;
    Ok(AuthUser::new(identity, token))
}

pub async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    create_user(state, ROLE_ADMIN).await
}

pub async fn create_cashier(state: &AppState) -> anyhow::Result<AuthUser> {
    create_user(state, ROLE_CASHIER).await
}

/// Creates an active product priced in cents with a unique SKU.
pub async fn create_product(
    state: &AppState,
    admin: &AuthUser,
    price_cents: i64,
    quantity: i32,
) -> anyhow::Result<Product> {
    let resp = product_service::create_product(
        state,
        admin,
        CreateProductRequest {
            sku: Some(unique("SKU")),
            barcode: None,
            name: unique("Widget"),
            description: None,
            price: Decimal::new(price_cents, 2),
            cost_price: None,
            quantity: Some(quantity),
            min_quantity: Some(2),
            category: Some("Test".into()),
        },
    )
    .await?;
    resp.data
        .ok_or_else(|| anyhow::anyhow!("create_product returned no data"))
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let (quantity,): (i32,) = sqlx::query_as("SELECT quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(quantity)
}

pub async fn count_rows(state: &AppState, sql: &str, id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(sql).bind(id).fetch_one(&state.pool).await?;
    Ok(count)
}

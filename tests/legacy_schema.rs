mod common;

use std::str::FromStr;

use pos_server::{
    db::{DbPool, create_pool, run_migrations},
    dto::sales::{CreateSaleRequest, SaleLineRequest},
    middleware::auth::AuthUser,
    models::SessionUser,
    services::{dashboard_service, product_service, sale_service, session_service},
    state::AppState,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use uuid::Uuid;

use common::{database_url, test_config};

const LEGACY_TABLES: &[&str] = &[
    r#"
    CREATE TABLE users (
        id UUID PRIMARY KEY,
        email VARCHAR(255) NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role VARCHAR(16) NOT NULL DEFAULT 'user',
        created_at TIMESTAMP NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE products (
        id UUID PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        price NUMERIC(10, 2) NOT NULL,
        stock INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE sales (
        id UUID PRIMARY KEY,
        total_amount NUMERIC(10, 2) NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT now()
    )
    "#,
];

/// Pool whose connections resolve unqualified names in `schema` only.
async fn schema_pool(url: &str, schema: &str) -> anyhow::Result<DbPool> {
    let options = PgConnectOptions::from_str(url)?.options([("search_path", schema)]);
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    Ok(pool)
}

async fn columns_of(pool: &DbPool, table: &str) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT column_name::text FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

#[tokio::test]
async fn legacy_tables_are_upgraded_in_place() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let admin_pool = create_pool(&url, 1).await?;
    let schema = format!("legacy_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin_pool)
        .await?;

    let outcome = upgrade_and_sell(&url, &schema).await;

    sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(&admin_pool)
        .await?;
    outcome
}

async fn upgrade_and_sell(url: &str, schema: &str) -> anyhow::Result<()> {
    let pool = schema_pool(url, schema).await?;
    for ddl in LEGACY_TABLES {
        sqlx::query(ddl).execute(&pool).await?;
    }

    let cashier_id = Uuid::new_v4();
    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash) VALUES ($1, 'till@example.com', 'x')")
        .bind(cashier_id)
        .execute(&pool)
        .await?;
    sqlx::query("INSERT INTO products (id, name, price, stock) VALUES ($1, 'Legacy Mug', 12.50, 6)")
        .bind(product_id)
        .execute(&pool)
        .await?;
    sqlx::query("INSERT INTO sales (id, total_amount) VALUES ($1, 25.00)")
        .bind(Uuid::new_v4())
        .execute(&pool)
        .await?;

    let state = AppState::new(pool, test_config(url));
    run_migrations(&state.orm).await?;
    run_migrations(&state.orm).await?;

    let product_columns = columns_of(&state.pool, "products").await?;
    for column in ["sku", "quantity", "created_at", "updated_at", "is_active", "min_quantity"] {
        assert!(product_columns.iter().any(|c| c == column), "products.{column} missing");
    }
    assert!(!product_columns.iter().any(|c| c == "stock"));
    let sale_columns = columns_of(&state.pool, "sales").await?;
    for column in ["user_id", "payment_method", "status"] {
        assert!(sale_columns.iter().any(|c| c == column), "sales.{column} missing");
    }
    assert!(!columns_of(&state.pool, "users").await?.iter().any(|c| c == "email"));

    let (username, role): (String, String) =
        sqlx::query_as("SELECT username, role FROM users WHERE id = $1")
            .bind(cashier_id)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(username, "till@example.com");
    assert_eq!(role, "cashier");

    let product = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("product");
    assert_eq!(product.quantity, 6);
    assert!(product.sku.starts_with("SKU-"));
    assert_eq!(product.price, Decimal::new(1250, 2));

    let identity = SessionUser {
        id: cashier_id,
        username: username.clone(),
        display_name: username,
        role,
    };
    let token = session_service::create_session(&state.orm, &identity).await?;
    let cashier = AuthUser::new(identity, token);

    let receipt = sale_service::process_sale(
        &state,
        &cashier,
        CreateSaleRequest {
            items: vec![SaleLineRequest {
                product_id,
                quantity: 2,
            }],
            payment_method: None,
        },
    )
    .await?
    .data
    .expect("receipt");
    assert_eq!(receipt.total_amount, Decimal::new(2500, 2));

    let product = product_service::get_product(&state, product_id)
        .await?
        .data
        .expect("product");
    assert_eq!(product.quantity, 4);

    let recent = sale_service::list_recent_sales(&state).await?.data.expect("sales").items;
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().any(|s| s.id == receipt.sale_id && s.payment_method == "cash"));

    let snapshot = dashboard_service::compute_snapshot(&state.pool, "UTC").await?;
    assert_eq!(snapshot.total_products, 1);
    Ok(())
}

use pos_server::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    models::ROLE_CASHIER,
    services::{auth_service, product_service},
    state::AppState,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    let state = AppState::new(pool, config);
    run_migrations(&state.orm).await?;

    let outcome = auth_service::reconcile_admin(&state.orm, &state.config.admin)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("Admin {} reconciled: {outcome:?}", state.config.admin.username);

    let cashier_id = ensure_cashier(&state.pool, "cashier", "cashier123").await?;
    seed_products(&state.pool).await?;

    println!("Seed completed. Cashier ID: {cashier_id}");
    Ok(())
}

async fn ensure_cashier(pool: &sqlx::PgPool, username: &str, password: &str) -> anyhow::Result<Uuid> {
    let password_hash =
        auth_service::hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, password_hash, display_name, role, is_active)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        ON CONFLICT (username) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(password_hash)
    .bind("Demo Cashier")
    .bind(ROLE_CASHIER)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {username} (role={ROLE_CASHIER})");
    Ok(user_id)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    // (sku, barcode, name, price, cost, quantity, category)
    let products = [
        ("SKU-DEMO0001", "4006381333931", "Espresso Beans 1kg", 1899, 1150, 40, "Coffee"),
        ("SKU-DEMO0002", "5901234123457", "Oat Milk 1L", 349, 210, 60, "Dairy"),
        ("SKU-DEMO0003", "9780201379624", "Paper Cups (50)", 599, 300, 8, "Supplies"),
        ("SKU-DEMO0004", "0012345678905", "Ferris Mug", 1250, 480, 25, "Merch"),
    ];

    for (sku, barcode, name, price, cost, quantity, category) in products {
        let price = Decimal::new(price, 2);
        let cost = Decimal::new(cost, 2);
        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, barcode, name, price, cost_price, profit_margin, quantity, min_quantity, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 10, $9)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(sku)
        .bind(barcode)
        .bind(name)
        .bind(price)
        .bind(cost)
        .bind(product_service::profit_margin(price, Some(cost)))
        .bind(quantity)
        .bind(category)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

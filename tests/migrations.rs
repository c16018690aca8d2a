mod common;

use pos_server::db::run_migrations;

use common::setup_state;

#[tokio::test]
async fn migrations_are_idempotent() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    run_migrations(&state.orm).await?;
    run_migrations(&state.orm).await?;

    let duplicated: Vec<(String, String, i64)> = sqlx::query_as(
        r#"
        SELECT table_name::text, column_name::text, COUNT(*)
        FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name IN ('users', 'products', 'sales', 'sale_items', 'inventory_history', 'sessions')
        GROUP BY table_name, column_name
        HAVING COUNT(*) > 1
        "#,
    )
    .fetch_all(&state.pool)
    .await?;
    assert!(duplicated.is_empty(), "duplicated columns: {duplicated:?}");
    Ok(())
}

#[tokio::test]
async fn reconciled_schema_has_expected_columns() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let columns: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT table_name::text, column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name IN ('users', 'products')
        "#,
    )
    .fetch_all(&state.pool)
    .await?;
    let has = |table: &str, column: &str| columns.iter().any(|(t, c)| t == table && c == column);

    for column in ["sku", "barcode", "cost_price", "profit_margin", "quantity", "min_quantity", "is_active", "updated_at"] {
        assert!(has("products", column), "products.{column} missing");
    }
    for column in ["username", "display_name", "role", "is_active"] {
        assert!(has("users", column), "users.{column} missing");
    }
    assert!(!has("products", "stock"), "legacy products.stock still present");
    assert!(!has("users", "email"), "legacy users.email still present");
    Ok(())
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    db::DbPool,
    error::AppResult,
    models::DashboardSnapshot,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Fail fast at startup when the configured timezone is unknown to Postgres.
pub async fn validate_timezone(pool: &DbPool, timezone: &str) -> anyhow::Result<()> {
    sqlx::query("SELECT now() AT TIME ZONE $1")
        .bind(timezone)
        .execute(pool)
        .await
        .map_err(|e| anyhow::anyhow!("invalid APP_TIMEZONE {timezone:?}: {e}"))?;
    Ok(())
}

pub async fn compute_snapshot(pool: &DbPool, timezone: &str) -> AppResult<DashboardSnapshot> {
    compute_snapshot_at(pool, timezone, Utc::now()).await
}

/// "Today" is the calendar day of `now` in `timezone`.
pub async fn compute_snapshot_at(
    pool: &DbPool,
    timezone: &str,
    now: DateTime<Utc>,
) -> AppResult<DashboardSnapshot> {
    let (todays_transactions, todays_sales): (i64, Decimal) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(total_amount), 0)
        FROM sales
        WHERE (created_at AT TIME ZONE $1)::date = ($2::timestamptz AT TIME ZONE $1)::date
        "#,
    )
    .bind(timezone)
    .bind(now)
    .fetch_one(pool)
    .await?;

    let (total_products, low_stock_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE is_active),
               COUNT(*) FILTER (WHERE is_active AND quantity <= min_quantity)
        FROM products
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardSnapshot {
        todays_transactions,
        todays_sales,
        total_products,
        low_stock_count,
    })
}

pub async fn dashboard(state: &AppState) -> AppResult<ApiResponse<DashboardSnapshot>> {
    let snapshot = compute_snapshot(&state.pool, &state.config.timezone).await?;
    Ok(ApiResponse::success("Dashboard", snapshot, Some(Meta::empty())))
}

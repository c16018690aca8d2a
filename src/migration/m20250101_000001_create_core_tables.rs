use sea_orm_migration::prelude::*;

use super::execute_all;

/// Tables only; indexes are created after column reconciliation.
#[derive(DeriveMigrationName)]
pub struct Migration;

const UP: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(64) NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        display_name VARCHAR(128) NOT NULL DEFAULT '',
        role VARCHAR(16) NOT NULL DEFAULT 'cashier',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        sku VARCHAR(64) NOT NULL UNIQUE,
        barcode VARCHAR(64) UNIQUE,
        name VARCHAR(255) NOT NULL,
        description TEXT,
        price NUMERIC(12, 2) NOT NULL,
        cost_price NUMERIC(12, 2) NOT NULL DEFAULT 0,
        profit_margin NUMERIC(12, 2) NOT NULL DEFAULT 0,
        quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        min_quantity INTEGER NOT NULL DEFAULT 10,
        category VARCHAR(128),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sales (
        id UUID PRIMARY KEY,
        user_id UUID REFERENCES users (id) ON DELETE SET NULL,
        total_amount NUMERIC(12, 2) NOT NULL,
        payment_method VARCHAR(32) NOT NULL DEFAULT 'cash',
        status VARCHAR(16) NOT NULL DEFAULT 'completed',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sale_items (
        id UUID PRIMARY KEY,
        sale_id UUID NOT NULL REFERENCES sales (id) ON DELETE CASCADE,
        product_id UUID NOT NULL REFERENCES products (id),
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        unit_price NUMERIC(12, 2) NOT NULL,
        subtotal NUMERIC(12, 2) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_history (
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products (id),
        change_type VARCHAR(16) NOT NULL,
        quantity_change INTEGER NOT NULL,
        reason TEXT,
        user_id UUID REFERENCES users (id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token_hash CHAR(64) PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        user_snapshot JSONB NOT NULL,
        expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

const DOWN: &[&str] = &[
    "DROP TABLE IF EXISTS sessions",
    "DROP TABLE IF EXISTS inventory_history",
    "DROP TABLE IF EXISTS sale_items",
    "DROP TABLE IF EXISTS sales",
    "DROP TABLE IF EXISTS products",
    "DROP TABLE IF EXISTS users",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(manager, UP).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        execute_all(manager, DOWN).await
    }
}

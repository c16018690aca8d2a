use sea_orm_migration::prelude::*;

use super::execute_all;

/// Brings tables created by older deployments up to the current column set.
/// Every statement is conditional, so it succeeds in any column-presence
/// state: missing columns are added, legacy data is carried over, types the
/// entities cannot decode are converted, then indexes are created.
#[derive(DeriveMigrationName)]
pub struct Migration;

/// `(table, column definition)` for every column an entity maps. Columns
/// that must be NOT NULL but have no sensible default are added nullable,
/// backfilled, then tightened.
const COLUMNS: &[(&str, &str)] = &[
    ("users", "username VARCHAR(64)"),
    ("users", "password_hash TEXT"),
    ("users", "display_name VARCHAR(128) NOT NULL DEFAULT ''"),
    ("users", "role VARCHAR(16) NOT NULL DEFAULT 'cashier'"),
    ("users", "is_active BOOLEAN NOT NULL DEFAULT TRUE"),
    ("users", "created_at TIMESTAMPTZ NOT NULL DEFAULT now()"),
    ("products", "sku VARCHAR(64)"),
    ("products", "barcode VARCHAR(64)"),
    ("products", "name VARCHAR(255) NOT NULL DEFAULT ''"),
    ("products", "description TEXT"),
    ("products", "price NUMERIC(12, 2) NOT NULL DEFAULT 0"),
    ("products", "cost_price NUMERIC(12, 2) NOT NULL DEFAULT 0"),
    ("products", "profit_margin NUMERIC(12, 2) NOT NULL DEFAULT 0"),
    ("products", "quantity INTEGER NOT NULL DEFAULT 0"),
    ("products", "min_quantity INTEGER NOT NULL DEFAULT 10"),
    ("products", "category VARCHAR(128)"),
    ("products", "is_active BOOLEAN NOT NULL DEFAULT TRUE"),
    ("products", "created_at TIMESTAMPTZ NOT NULL DEFAULT now()"),
    ("products", "updated_at TIMESTAMPTZ NOT NULL DEFAULT now()"),
    ("sales", "user_id UUID REFERENCES users (id) ON DELETE SET NULL"),
    ("sales", "total_amount NUMERIC(12, 2) NOT NULL DEFAULT 0"),
    ("sales", "payment_method VARCHAR(32) NOT NULL DEFAULT 'cash'"),
    ("sales", "status VARCHAR(16) NOT NULL DEFAULT 'completed'"),
    ("sales", "created_at TIMESTAMPTZ NOT NULL DEFAULT now()"),
    ("sale_items", "sale_id UUID REFERENCES sales (id) ON DELETE CASCADE"),
    ("sale_items", "product_id UUID REFERENCES products (id)"),
    ("sale_items", "quantity INTEGER NOT NULL DEFAULT 0"),
    ("sale_items", "unit_price NUMERIC(12, 2) NOT NULL DEFAULT 0"),
    ("sale_items", "subtotal NUMERIC(12, 2) NOT NULL DEFAULT 0"),
    ("inventory_history", "product_id UUID REFERENCES products (id)"),
    ("inventory_history", "change_type VARCHAR(16) NOT NULL DEFAULT 'adjustment'"),
    ("inventory_history", "quantity_change INTEGER NOT NULL DEFAULT 0"),
    ("inventory_history", "reason TEXT"),
    ("inventory_history", "user_id UUID REFERENCES users (id) ON DELETE SET NULL"),
    ("inventory_history", "created_at TIMESTAMPTZ NOT NULL DEFAULT now()"),
    ("sessions", "user_id UUID REFERENCES users (id) ON DELETE CASCADE"),
    ("sessions", "user_snapshot JSONB NOT NULL DEFAULT '{}'::jsonb"),
    ("sessions", "expires_at TIMESTAMPTZ"),
    ("sessions", "created_at TIMESTAMPTZ NOT NULL DEFAULT now()"),
];

/// `(table, column, information_schema data_type, target type)`.
const RETYPES: &[(&str, &str, &str, &str)] = &[
    ("users", "created_at", "timestamp with time zone", "TIMESTAMPTZ"),
    ("products", "price", "numeric", "NUMERIC(12, 2)"),
    ("products", "quantity", "integer", "INTEGER"),
    ("products", "created_at", "timestamp with time zone", "TIMESTAMPTZ"),
    ("products", "updated_at", "timestamp with time zone", "TIMESTAMPTZ"),
    ("sales", "total_amount", "numeric", "NUMERIC(12, 2)"),
    ("sales", "created_at", "timestamp with time zone", "TIMESTAMPTZ"),
    ("inventory_history", "created_at", "timestamp with time zone", "TIMESTAMPTZ"),
];

const INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (username)",
    "CREATE UNIQUE INDEX IF NOT EXISTS products_sku_key ON products (sku)",
    "CREATE UNIQUE INDEX IF NOT EXISTS products_barcode_key ON products (barcode)",
    "CREATE INDEX IF NOT EXISTS idx_sales_created_at ON sales (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_sale_items_sale_id ON sale_items (sale_id)",
    "CREATE INDEX IF NOT EXISTS idx_inventory_history_product ON inventory_history (product_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions (user_id)",
];

fn add_column(table: &str, definition: &str) -> String {
    format!("ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {definition}")
}

/// Runs `body` only when `table.column` exists in the current schema.
fn when_column(table: &str, column: &str, extra: &str, body: &str) -> String {
    format!(
        "DO $$ BEGIN IF EXISTS (SELECT 1 FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = '{table}' \
         AND column_name = '{column}'{extra}) THEN {body}; END IF; END $$"
    )
}

fn retype(table: &str, column: &str, data_type: &str, target: &str) -> String {
    when_column(
        table,
        column,
        &format!(" AND data_type <> '{data_type}'"),
        &format!("ALTER TABLE {table} ALTER COLUMN {column} TYPE {target} USING {column}::{target}"),
    )
}

fn statements() -> Vec<String> {
    let mut stmts: Vec<String> = COLUMNS
        .iter()
        .map(|(table, definition)| add_column(table, definition))
        .collect();

    stmts.extend(
        RETYPES
            .iter()
            .map(|(table, column, data_type, target)| retype(table, column, data_type, target)),
    );

    // users: legacy accounts were keyed by email
    stmts.push(when_column(
        "users",
        "email",
        "",
        "UPDATE users SET username = email WHERE username IS NULL",
    ));
    stmts.push(
        "UPDATE users SET username = 'user-' || substr(md5(id::text), 1, 12) WHERE username IS NULL".into(),
    );
    // '!' is not a PHC string, so such accounts cannot log in until reset
    stmts.push("UPDATE users SET password_hash = '!' WHERE password_hash IS NULL".into());
    stmts.push("UPDATE users SET display_name = username WHERE display_name = ''".into());
    stmts.push("UPDATE users SET role = 'cashier' WHERE role NOT IN ('admin', 'cashier')".into());
    stmts.push("ALTER TABLE users ALTER COLUMN username SET NOT NULL".into());
    stmts.push("ALTER TABLE users ALTER COLUMN password_hash SET NOT NULL".into());
    stmts.push("ALTER TABLE users DROP COLUMN IF EXISTS email".into());

    // products: stock was the on-hand count before quantity existed
    stmts.push(when_column(
        "products",
        "stock",
        "",
        "UPDATE products SET quantity = GREATEST(COALESCE(stock::integer, 0), 0)",
    ));
    stmts.push("UPDATE products SET quantity = 0 WHERE quantity < 0".into());
    stmts.push(
        "UPDATE products SET sku = 'SKU-' || upper(substr(md5(id::text), 1, 8)) \
         WHERE sku IS NULL OR btrim(sku) = ''"
            .into(),
    );
    stmts.push("UPDATE products SET barcode = NULL WHERE btrim(barcode) = ''".into());
    stmts.push("ALTER TABLE products ALTER COLUMN sku SET NOT NULL".into());
    stmts.push(
        "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_constraint \
         WHERE conname = 'products_quantity_check' AND conrelid = 'products'::regclass) \
         THEN ALTER TABLE products ADD CONSTRAINT products_quantity_check CHECK (quantity >= 0); \
         END IF; END $$"
            .into(),
    );
    stmts.push("ALTER TABLE products DROP COLUMN IF EXISTS stock".into());

    stmts.extend(INDEXES.iter().map(|s| ToString::to_string(*s)));
    stmts
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let stmts = statements();
        execute_all(manager, stmts.as_slice()).await
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_is_copied_before_it_is_dropped() {
        let stmts = statements();
        let copy = stmts
            .iter()
            .position(|s| s.contains("SET quantity = GREATEST"))
            .expect("copy statement");
        let drop = stmts
            .iter()
            .position(|s| s.contains("DROP COLUMN IF EXISTS stock"))
            .expect("drop statement");
        assert!(copy < drop);
    }

    #[test]
    fn indexes_follow_every_column_change() {
        let stmts = statements();
        let first_index = stmts
            .iter()
            .position(|s| s.starts_with("CREATE"))
            .expect("index statement");
        assert!(stmts[first_index..].iter().all(|s| s.starts_with("CREATE")));
    }

    #[test]
    fn column_guards_are_scoped_to_current_schema() {
        let stmt = when_column("products", "stock", "", "SELECT 1");
        assert!(stmt.contains("table_schema = current_schema()"));
        assert!(stmt.contains("column_name = 'stock'"));
    }
}

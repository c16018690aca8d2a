use sea_orm_migration::prelude::*;

mod m20250101_000001_create_core_tables;
mod m20250101_000002_reconcile_columns;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_core_tables::Migration),
            Box::new(m20250101_000002_reconcile_columns::Migration),
        ]
    }
}

/// Postgres prepared statements cannot contain multiple commands, so each
/// step is executed on its own.
pub(crate) async fn execute_all<S: AsRef<str> + Sync>(
    manager: &SchemaManager<'_>,
    statements: &[S],
) -> Result<(), DbErr> {
    let db = manager.get_connection();
    for stmt in statements {
        db.execute_unprepared(stmt.as_ref()).await?;
    }
    Ok(())
}

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_schema_and_base_db_setup;
mod m20250301_000002_create_sales_reps_and_calls;
mod m20250301_000003_create_analyses;
mod m20250301_000004_create_triage_and_audit_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_schema_and_base_db_setup::Migration),
            Box::new(m20250301_000002_create_sales_reps_and_calls::Migration),
            Box::new(m20250301_000003_create_analyses::Migration),
            Box::new(m20250301_000004_create_triage_and_audit_tables::Migration),
        ]
    }
}

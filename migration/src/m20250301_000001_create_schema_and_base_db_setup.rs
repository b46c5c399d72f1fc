use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS sales_pipeline;")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("SET search_path TO sales_pipeline, public;")
            .await?;

        // The application role owns everything in the pipeline schema
        manager
            .get_connection()
            .execute_unprepared(r#"
                DO $$ BEGIN
                    GRANT ALL PRIVILEGES ON DATABASE sales TO sales;
                    GRANT ALL ON SCHEMA sales_pipeline TO sales;

                    ALTER DEFAULT PRIVILEGES IN SCHEMA sales_pipeline GRANT ALL ON TABLES TO sales;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA sales_pipeline GRANT ALL ON SEQUENCES TO sales;
                END $$;
            "#)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(r#"
                DO $$ BEGIN
                    ALTER DEFAULT PRIVILEGES IN SCHEMA sales_pipeline REVOKE ALL ON SEQUENCES FROM sales;
                    ALTER DEFAULT PRIVILEGES IN SCHEMA sales_pipeline REVOKE ALL ON TABLES FROM sales;
                    REVOKE ALL ON SCHEMA sales_pipeline FROM sales;
                    REVOKE ALL PRIVILEGES ON DATABASE sales FROM sales;
                END $$;
            "#)
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS sales_pipeline CASCADE;")
            .await?;

        Ok(())
    }
}

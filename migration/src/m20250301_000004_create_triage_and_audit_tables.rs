use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS sales_pipeline.unmatched_calls (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                external_call_id VARCHAR(255) NOT NULL,
                meeting_title TEXT NOT NULL,
                start_time TIMESTAMPTZ NOT NULL,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                transcript TEXT,
                recording_url TEXT,
                participants JSONB NOT NULL DEFAULT '[]'::jsonb,
                payload JSONB NOT NULL,
                reviewed BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS sales_pipeline.webhook_logs (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                endpoint VARCHAR(255) NOT NULL,
                method VARCHAR(16) NOT NULL,
                payload JSONB NOT NULL DEFAULT '{}'::jsonb,
                status_code INTEGER NOT NULL,
                error_message TEXT,
                processing_time_ms BIGINT NOT NULL DEFAULT 0,
                events JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_webhook_logs_created_at
                ON sales_pipeline.webhook_logs(created_at DESC)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TABLE IF EXISTS sales_pipeline.webhook_logs")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS sales_pipeline.unmatched_calls")
            .await?;

        Ok(())
    }
}

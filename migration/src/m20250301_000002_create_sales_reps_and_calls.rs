use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TYPE sales_pipeline.call_status AS ENUM (
                'pending',
                'analyzing',
                'completed',
                'failed'
            )",
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS sales_pipeline.sales_reps (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name VARCHAR(255) NOT NULL,
                email VARCHAR(255) NOT NULL,
                teams JSONB NOT NULL DEFAULT '[]'::jsonb,
                archived_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT sales_reps_email_unique UNIQUE(email)
            )
        "#,
        )
        .await?;

        // Matching only ever looks at active reps
        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_sales_reps_active_email
                ON sales_pipeline.sales_reps(LOWER(email)) WHERE archived_at IS NULL",
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS sales_pipeline.calls (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                external_call_id VARCHAR(255) NOT NULL,
                rep_id UUID REFERENCES sales_pipeline.sales_reps(id) ON DELETE SET NULL,
                meeting_title TEXT NOT NULL,
                transcript TEXT,
                recording_url TEXT,
                participants JSONB NOT NULL DEFAULT '[]'::jsonb,
                start_time TIMESTAMPTZ NOT NULL,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                status sales_pipeline.call_status NOT NULL DEFAULT 'pending',
                team VARCHAR(255),
                error_message TEXT,
                synced_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT calls_external_call_id_unique UNIQUE(external_call_id)
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_calls_status_synced_at
                ON sales_pipeline.calls(status, synced_at)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_calls_rep_id ON sales_pipeline.calls(rep_id)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TABLE IF EXISTS sales_pipeline.calls")
            .await?;
        db.execute_unprepared("DROP TABLE IF EXISTS sales_pipeline.sales_reps")
            .await?;
        db.execute_unprepared("DROP TYPE IF EXISTS sales_pipeline.call_status")
            .await?;

        Ok(())
    }
}

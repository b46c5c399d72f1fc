use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE TYPE sales_pipeline.call_type AS ENUM (
                'sales_call',
                'team_meeting',
                'demo',
                'support',
                'development',
                'stand_up',
                'unknown'
            )",
        )
        .await?;

        // No unique constraint on call_id: racing ingestions may write two rows,
        // which the dedupe pass collapses to the most recent.
        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS sales_pipeline.analyses (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                call_id UUID NOT NULL
                    REFERENCES sales_pipeline.calls(id) ON DELETE CASCADE,
                framework_score INTEGER CHECK (framework_score BETWEEN 0 AND 100),
                sentiment_score INTEGER CHECK (sentiment_score BETWEEN 0 AND 100),
                is_sales_call BOOLEAN NOT NULL DEFAULT TRUE,
                call_type sales_pipeline.call_type NOT NULL DEFAULT 'unknown',
                confidence_score DOUBLE PRECISION NOT NULL DEFAULT 0.5,
                rejection_reason TEXT,
                key_topics JSONB NOT NULL DEFAULT '[]'::jsonb,
                analysis_data JSONB NOT NULL DEFAULT '{}'::jsonb,
                analyzed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT analyses_rejection_has_no_score
                    CHECK (is_sales_call OR framework_score IS NULL)
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_analyses_call_id_analyzed_at
                ON sales_pipeline.analyses(call_id, analyzed_at DESC)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TABLE IF EXISTS sales_pipeline.analyses")
            .await?;
        db.execute_unprepared("DROP TYPE IF EXISTS sales_pipeline.call_type")
            .await?;

        Ok(())
    }
}

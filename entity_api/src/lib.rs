use sea_orm::DatabaseConnection;

pub use entity::{
    analyses, call_status, call_type, calls, json_types, sales_reps, unmatched_calls, webhook_logs,
    Id,
};

pub mod analysis;
pub mod call;
pub mod error;
pub mod sales_rep;
pub mod unmatched_call;
pub mod webhook_log;

/// Seeds a development database with a handful of reps covering the matching rules:
/// a rep with no team restriction, a rep limited to one provider team, and an archived rep.
pub async fn seed_database(db: &DatabaseConnection) -> Result<(), error::Error> {
    sales_rep::create(db, "Jane Closer", "jane@example.com", Vec::new()).await?;

    sales_rep::create(
        db,
        "Sam Enterprise",
        "sam@example.com",
        vec!["Enterprise".to_owned()],
    )
    .await?;

    let former = sales_rep::create(db, "Former Rep", "former@example.com", Vec::new()).await?;
    sales_rep::archive(db, former.id).await?;

    Ok(())
}

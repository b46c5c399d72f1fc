pub use super::analyses::Entity as Analyses;
pub use super::calls::Entity as Calls;
pub use super::sales_reps::Entity as SalesReps;
pub use super::unmatched_calls::Entity as UnmatchedCalls;
pub use super::webhook_logs::Entity as WebhookLogs;

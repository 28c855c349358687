//! Durable store for trade plans and their action logs.

use async_trait::async_trait;

use crate::domain::entities::action_log::ActionLogEntry;
use crate::domain::entities::trade_plan::{NewTradePlan, TaskState, TradePlan};
use crate::domain::errors::PersistenceError;

/// Default bound on auth-token collision retries at plan creation.
pub const DEFAULT_TOKEN_MAX_ATTEMPTS: u32 = 32;

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a new plan with status `none` and a fresh unique auth token.
    ///
    /// # Errors
    /// `PersistenceError::TokenExhausted` when no unique token was found
    /// within the configured number of attempts.
    async fn create_trade_plan(&self, plan: NewTradePlan) -> Result<TradePlan, PersistenceError>;

    async fn get_trade_plan(&self, id: i64) -> Result<Option<TradePlan>, PersistenceError>;

    /// Last writer wins.
    async fn update_status(&self, id: i64, status: TaskState) -> Result<(), PersistenceError>;

    async fn append_action_log(&self, entry: &ActionLogEntry) -> Result<(), PersistenceError>;

    /// Entries of one plan in insertion order.
    async fn action_logs(&self, trade_plan_id: i64)
        -> Result<Vec<ActionLogEntry>, PersistenceError>;
}

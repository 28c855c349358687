//! Database Repository
//!
//! SQLite implementation of the `AuditStore`.

use super::models::*;
use super::DbPool;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, warn};

use crate::domain::entities::action_log::ActionLogEntry;
use crate::domain::entities::trade_plan::{NewTradePlan, TaskState, TradePlan};
use crate::domain::errors::PersistenceError;
use crate::domain::repositories::audit_store::{AuditStore, DEFAULT_TOKEN_MAX_ATTEMPTS};

type TokenGenerator = Box<dyn Fn() -> String + Send + Sync>;

fn query_error(context: &str, e: impl std::fmt::Display) -> PersistenceError {
    error!("{}: {}", context, e);
    PersistenceError::QueryError(format!("{}: {}", context, e))
}

/// Trade plan and action log repository
pub struct SqliteAuditStore {
    pool: DbPool,
    token_generator: TokenGenerator,
    token_max_attempts: u32,
}

impl SqliteAuditStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            token_generator: Box::new(|| uuid::Uuid::new_v4().simple().to_string()),
            token_max_attempts: DEFAULT_TOKEN_MAX_ATTEMPTS,
        }
    }

    pub fn with_token_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.token_generator = Box::new(generator);
        self
    }

    pub fn with_token_max_attempts(mut self, attempts: u32) -> Self {
        self.token_max_attempts = attempts.max(1);
        self
    }

    /// Insert the plan under `token`. A token already taken comes back as
    /// `Ok(None)` so the caller can draw another.
    async fn insert_plan(
        &self,
        plan: &NewTradePlan,
        token: &str,
        loop_json: &str,
        amounts_json: &str,
    ) -> Result<Option<TradePlanRecord>, PersistenceError> {
        let inserted = sqlx::query_as::<_, TradePlanRecord>(
            r#"
            INSERT INTO trade_plans (
                owner_id, auth_token, loop_json, amounts_json,
                exec_type, check_balance, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(plan.owner_id)
        .bind(token)
        .bind(loop_json)
        .bind(amounts_json)
        .bind(plan.execution_mode.as_str())
        .bind(plan.check_balance)
        .bind(TaskState::None.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(record) => Ok(Some(record)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(query_error("Failed to create trade plan", e)),
        }
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn create_trade_plan(&self, plan: NewTradePlan) -> Result<TradePlan, PersistenceError> {
        let loop_json = serde_json::to_string(&plan.loop_hops)
            .map_err(|e| query_error("Failed to encode loop", e))?;
        let amounts_json = serde_json::to_string(&plan.amounts)
            .map_err(|e| query_error("Failed to encode amounts", e))?;

        // The UNIQUE index on auth_token decides collisions, so concurrent
        // creates can't both claim a token.
        for attempt in 1..=self.token_max_attempts {
            let token = (self.token_generator)();
            if let Some(record) = self
                .insert_plan(&plan, &token, &loop_json, &amounts_json)
                .await?
            {
                debug!("Created trade plan: {} for user {}", record.id, record.owner_id);
                return TradePlan::try_from(record);
            }
            debug!(
                "Auth token collision (attempt {}/{})",
                attempt, self.token_max_attempts
            );
        }

        warn!(
            "Couldn't generate a unique auth token after {} attempts",
            self.token_max_attempts
        );
        Err(PersistenceError::TokenExhausted {
            attempts: self.token_max_attempts,
        })
    }

    async fn get_trade_plan(&self, id: i64) -> Result<Option<TradePlan>, PersistenceError> {
        let record = sqlx::query_as::<_, TradePlanRecord>("SELECT * FROM trade_plans WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to get trade plan", e))?;

        record.map(TradePlan::try_from).transpose()
    }

    async fn update_status(&self, id: i64, status: TaskState) -> Result<(), PersistenceError> {
        let rows_affected = sqlx::query("UPDATE trade_plans SET status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to update trade plan status", e))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(PersistenceError::TradePlanNotFound(id));
        }

        debug!("Trade plan {} status: {}", id, status);
        Ok(())
    }

    async fn append_action_log(&self, entry: &ActionLogEntry) -> Result<(), PersistenceError> {
        let details = serde_json::to_string(&entry.details)
            .map_err(|e| query_error("Failed to encode action log details", e))?;

        sqlx::query(
            r#"
            INSERT INTO action_logs (
                trade_plan_id, start_time, timestamp, exchange, loop_num,
                loop_tag, status, retry_count, details
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(entry.trade_plan_id)
        .bind(entry.start_time)
        .bind(entry.timestamp)
        .bind(entry.exchange.name())
        .bind(entry.hop_index as i64)
        .bind(entry.loop_tag.as_str())
        .bind(entry.status.as_str())
        .bind(i64::from(entry.retry_count))
        .bind(&details)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to append action log", e))?;

        Ok(())
    }

    async fn action_logs(
        &self,
        trade_plan_id: i64,
    ) -> Result<Vec<ActionLogEntry>, PersistenceError> {
        let records = sqlx::query_as::<_, ActionLogRecord>(
            "SELECT * FROM action_logs WHERE trade_plan_id = ?1 ORDER BY id ASC",
        )
        .bind(trade_plan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get action logs", e))?;

        records.into_iter().map(ActionLogEntry::try_from).collect()
    }
}

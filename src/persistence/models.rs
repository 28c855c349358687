//! Database Models
//!
//! Persistent data structures for trade plans and action logs, and their
//! conversion into domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::domain::entities::action_log::{ActionLogEntry, LoopTag};
use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::trade_plan::{ExecutionMode, TaskState, TradePlan};
use crate::domain::errors::PersistenceError;

/// Trade plan record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradePlanRecord {
    pub id: i64,
    pub owner_id: i64,
    pub auth_token: String,
    pub loop_json: String,    // JSON array of hops
    pub amounts_json: String, // JSON array of [exchange, amount]
    pub exec_type: String,    // "sequential" or "parallel"
    pub check_balance: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Action log record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionLogRecord {
    pub id: i64,
    pub trade_plan_id: i64,
    pub start_time: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
    pub loop_num: i64,
    pub loop_tag: String,
    pub status: String,
    pub retry_count: i64,
    pub details: String, // JSON string
}

fn corrupt(what: &str, id: i64, detail: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::CorruptRecord(format!("{} {}: {}", what, id, detail))
}

impl TryFrom<TradePlanRecord> for TradePlan {
    type Error = PersistenceError;

    fn try_from(record: TradePlanRecord) -> Result<Self, Self::Error> {
        let loop_hops = serde_json::from_str(&record.loop_json)
            .map_err(|e| corrupt("trade plan", record.id, e))?;
        let amounts = serde_json::from_str(&record.amounts_json)
            .map_err(|e| corrupt("trade plan", record.id, e))?;
        let execution_mode = ExecutionMode::parse(&record.exec_type).ok_or_else(|| {
            corrupt("trade plan", record.id, format!("exec_type {}", record.exec_type))
        })?;
        let status = TaskState::parse(&record.status)
            .ok_or_else(|| corrupt("trade plan", record.id, format!("status {}", record.status)))?;

        Ok(TradePlan {
            id: record.id,
            owner_id: record.owner_id,
            loop_hops,
            amounts,
            execution_mode,
            check_balance: record.check_balance,
            status,
            auth_token: record.auth_token,
            created_at: record.created_at,
        })
    }
}

impl TryFrom<ActionLogRecord> for ActionLogEntry {
    type Error = PersistenceError;

    fn try_from(record: ActionLogRecord) -> Result<Self, Self::Error> {
        let loop_tag = LoopTag::parse(&record.loop_tag).ok_or_else(|| {
            corrupt("action log", record.id, format!("loop_tag {}", record.loop_tag))
        })?;
        let status = TaskState::parse(&record.status)
            .ok_or_else(|| corrupt("action log", record.id, format!("status {}", record.status)))?;
        let details: Map<String, Value> = serde_json::from_str(&record.details)
            .map_err(|e| corrupt("action log", record.id, e))?;

        Ok(ActionLogEntry {
            trade_plan_id: record.trade_plan_id,
            start_time: record.start_time,
            timestamp: record.timestamp,
            exchange: Exchange::new(record.exchange),
            hop_index: usize::try_from(record.loop_num)
                .map_err(|e| corrupt("action log", record.id, e))?,
            loop_tag,
            status,
            retry_count: u32::try_from(record.retry_count)
                .map_err(|e| corrupt("action log", record.id, e))?,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_record() -> TradePlanRecord {
        TradePlanRecord {
            id: 3,
            owner_id: 1,
            auth_token: "tok".to_string(),
            loop_json: r#"[["gdax","USD","BTC"],["gdax","BTC","USD"]]"#.to_string(),
            amounts_json: r#"[["gdax","100"]]"#.to_string(),
            exec_type: "parallel".to_string(),
            check_balance: true,
            status: "progress".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_trade_plan_record_conversion() {
        let plan = TradePlan::try_from(plan_record()).unwrap();
        assert_eq!(plan.loop_hops.len(), 2);
        assert_eq!(plan.amounts[0].exchange, Exchange::new("gdax"));
        assert_eq!(plan.execution_mode, ExecutionMode::Parallel);
        assert_eq!(plan.status, TaskState::Progress);
    }

    #[test]
    fn test_corrupt_trade_plan_record() {
        let mut record = plan_record();
        record.status = "exploded".to_string();
        assert!(matches!(
            TradePlan::try_from(record),
            Err(PersistenceError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_action_log_record_conversion() {
        let record = ActionLogRecord {
            id: 1,
            trade_plan_id: 3,
            start_time: Utc::now(),
            timestamp: Utc::now(),
            exchange: "gdax".to_string(),
            loop_num: 1,
            loop_tag: "order_status".to_string(),
            status: "step_passed".to_string(),
            retry_count: 2,
            details: r#"{"order_id":"x"}"#.to_string(),
        };
        let entry = ActionLogEntry::try_from(record).unwrap();
        assert_eq!(entry.hop_index, 1);
        assert_eq!(entry.loop_tag, LoopTag::OrderStatus);
        assert_eq!(entry.retry_count, 2);
        assert_eq!(entry.details["order_id"], "x");
    }
}

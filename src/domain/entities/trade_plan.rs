//! Trade plan entity and the execution units derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::hop::Hop;
use crate::domain::value_objects::amount::Amount;

/// Status of a plan or of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    None,
    Progress,
    StepPassed,
    /// One sub-loop finished its last hop
    Success,
    /// The whole plan finished
    Completed,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::None => "none",
            TaskState::Progress => "progress",
            TaskState::StepPassed => "step_passed",
            TaskState::Success => "success",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(TaskState::None),
            "progress" => Some(TaskState::Progress),
            "step_passed" => Some(TaskState::StepPassed),
            "success" => Some(TaskState::Success),
            "completed" => Some(TaskState::Completed),
            "failed" => Some(TaskState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sequential" => Some(ExecutionMode::Sequential),
            "parallel" => Some(ExecutionMode::Parallel),
            _ => None,
        }
    }
}

/// Starting capital for one exchange, `[exchange, amount]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Exchange, Amount)", into = "(Exchange, Amount)")]
pub struct AmountEntry {
    pub exchange: Exchange,
    pub amount: Amount,
}

impl AmountEntry {
    pub fn new(exchange: impl Into<Exchange>, amount: Amount) -> Self {
        Self {
            exchange: exchange.into(),
            amount,
        }
    }
}

impl From<(Exchange, Amount)> for AmountEntry {
    fn from((exchange, amount): (Exchange, Amount)) -> Self {
        Self { exchange, amount }
    }
}

impl From<AmountEntry> for (Exchange, Amount) {
    fn from(entry: AmountEntry) -> Self {
        (entry.exchange, entry.amount)
    }
}

/// A validated plan that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTradePlan {
    pub owner_id: i64,
    pub loop_hops: Vec<Hop>,
    pub amounts: Vec<AmountEntry>,
    pub execution_mode: ExecutionMode,
    pub check_balance: bool,
}

/// A persisted trade plan. Plain value, cloned into every task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePlan {
    pub id: i64,
    pub owner_id: i64,
    #[serde(rename = "loop")]
    pub loop_hops: Vec<Hop>,
    pub amounts: Vec<AmountEntry>,
    pub execution_mode: ExecutionMode,
    pub check_balance: bool,
    pub status: TaskState,
    pub auth_token: String,
    pub created_at: DateTime<Utc>,
}

/// Maximal run of consecutive hops on one exchange, executed as one task.
#[derive(Debug, Clone, PartialEq)]
pub struct SubLoop {
    /// Position among the plan's sub-loops
    pub index: usize,
    pub exchange: Exchange,
    pub hops: Vec<Hop>,
    /// First hop's source currency, the one the balance check looks at
    pub currency: String,
    pub starting_amount: Amount,
}

impl SubLoop {
    pub fn is_last_hop(&self, hop_index: usize) -> bool {
        hop_index + 1 == self.hops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_wire_values() {
        assert_eq!(
            serde_json::to_string(&TaskState::StepPassed).unwrap(),
            "\"step_passed\""
        );
        assert_eq!(TaskState::parse("completed"), Some(TaskState::Completed));
        assert_eq!(TaskState::parse("bogus"), None);
    }

    #[test]
    fn test_task_state_round_trips_through_str() {
        for state in [
            TaskState::None,
            TaskState::Progress,
            TaskState::StepPassed,
            TaskState::Success,
            TaskState::Completed,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_execution_mode_default_is_sequential() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
        let mode: ExecutionMode = serde_json::from_str("\"parallel\"").unwrap();
        assert_eq!(mode, ExecutionMode::Parallel);
    }

    #[test]
    fn test_amount_entry_wire_format() {
        let entry: AmountEntry = serde_json::from_str(r#"["gdax","250"]"#).unwrap();
        assert_eq!(entry.exchange, Exchange::new("gdax"));
        assert_eq!(entry.amount, Amount::parse("250").unwrap());
    }

    #[test]
    fn test_sub_loop_last_hop() {
        let sub_loop = SubLoop {
            index: 0,
            exchange: Exchange::new("gdax"),
            hops: vec![
                Hop::new("gdax", "USD", "BTC"),
                Hop::new("gdax", "BTC", "USD"),
            ],
            currency: "USD".to_string(),
            starting_amount: Amount::parse("100").unwrap(),
        };
        assert!(!sub_loop.is_last_hop(0));
        assert!(sub_loop.is_last_hop(1));
    }
}

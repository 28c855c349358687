use thiserror::Error;

use crate::domain::repositories::exchange_client::ExchangeError;

/// Structural problems with a trade request. Terminal: no task is scheduled.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Loop must contain at least 2 hops, got {0}")]
    LoopTooShort(usize),

    #[error("Amount list is empty")]
    NoAmounts,

    #[error("Hop {index} has an empty exchange")]
    EmptyExchange { index: usize },

    #[error("Hop {index} has an empty currency")]
    EmptyCurrency { index: usize },

    #[error("Hop {index} converts {currency} into itself")]
    SameCurrency { index: usize, currency: String },

    #[error("Amount entry {index} has an empty exchange")]
    EmptyAmountExchange { index: usize },

    #[error("Amount entry {index} must be positive, got {value}")]
    NonPositiveAmount { index: usize, value: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No amount entry for sub-loop {index} on {exchange}")]
    MissingAmount { index: usize, exchange: String },

    #[error("Value must be non-negative")]
    MustBeNonNegative,

    #[error("Division by zero")]
    DivisionByZero,
}

/// Failures of the audit store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Couldn't generate a unique auth token after {attempts} attempts")]
    TokenExhausted { attempts: u32 },

    #[error("Trade plan not found: {0}")]
    TradePlanNotFound(i64),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

/// Infrastructure failures that abort a dispatched task instead of producing
/// a trade outcome. Reported to the client as CONNECTION_ERROR.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskError {
    #[error("Exchange connection lost on {exchange}: {reason}")]
    Transport { exchange: String, reason: String },

    #[error("Worker task aborted: {0}")]
    WorkerAborted(String),
}

impl TaskError {
    pub fn from_exchange(exchange: &str, error: &ExchangeError) -> Self {
        TaskError::Transport {
            exchange: exchange.to_string(),
            reason: error.to_string(),
        }
    }
}

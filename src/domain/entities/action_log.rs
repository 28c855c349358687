//! Audit trail rows and the progress messages streamed to the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::trade_plan::TaskState;

/// Classification of an audit/progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopTag {
    VerifyPayload,
    Balance,
    PlaceOrder,
    OrderStatus,
    FinalStatus,
    ConnectionError,
}

impl LoopTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopTag::VerifyPayload => "verify_payload",
            LoopTag::Balance => "balance",
            LoopTag::PlaceOrder => "place_order",
            LoopTag::OrderStatus => "order_status",
            LoopTag::FinalStatus => "final_status",
            LoopTag::ConnectionError => "connection_error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "verify_payload" => Some(LoopTag::VerifyPayload),
            "balance" => Some(LoopTag::Balance),
            "place_order" => Some(LoopTag::PlaceOrder),
            "order_status" => Some(LoopTag::OrderStatus),
            "final_status" => Some(LoopTag::FinalStatus),
            "connection_error" => Some(LoopTag::ConnectionError),
            _ => None,
        }
    }
}

/// One state transition of a trade plan run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionLogEntry {
    pub trade_plan_id: i64,
    /// Groups the entries written by one run
    pub start_time: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub exchange: Exchange,
    pub hop_index: usize,
    pub loop_tag: LoopTag,
    pub status: TaskState,
    pub retry_count: u32,
    pub details: Map<String, Value>,
}

impl ActionLogEntry {
    pub fn new(
        trade_plan_id: i64,
        start_time: DateTime<Utc>,
        exchange: Exchange,
        hop_index: usize,
        loop_tag: LoopTag,
        status: TaskState,
    ) -> Self {
        Self {
            trade_plan_id,
            start_time,
            timestamp: Utc::now(),
            exchange,
            hop_index,
            loop_tag,
            status,
            retry_count: 0,
            details: Map::new(),
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details.extend(details);
        self
    }

    /// Client-facing view of this entry.
    pub fn to_message(&self) -> ProgressMessage {
        let mut fields = self.details.clone();
        if !self.exchange.is_empty() {
            fields.insert("exchange".to_string(), Value::from(self.exchange.name()));
        }
        fields.insert("retry_count".to_string(), Value::from(self.retry_count));
        fields.insert(
            "timestamp".to_string(),
            Value::from(self.timestamp.timestamp_millis() as f64 / 1000.0),
        );

        ProgressMessage {
            status: self.status,
            loop_num: self.hop_index,
            loop_tag: self.loop_tag,
            fields,
        }
    }
}

/// Message streamed to the client for every step and for the final outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub status: TaskState,
    pub loop_num: usize,
    pub loop_tag: LoopTag,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ProgressMessage {
    fn bare(status: TaskState, loop_tag: LoopTag) -> Self {
        Self {
            status,
            loop_num: 0,
            loop_tag,
            fields: Map::new(),
        }
    }

    pub fn payload_error(reason: &str) -> Self {
        let mut message = Self::bare(TaskState::Failed, LoopTag::VerifyPayload);
        message
            .fields
            .insert("error".to_string(), Value::from(reason));
        message
    }

    pub fn connection_error() -> Self {
        Self::bare(TaskState::Failed, LoopTag::ConnectionError)
    }

    pub fn final_status(status: TaskState) -> Self {
        Self::bare(status, LoopTag::FinalStatus)
    }

    /// Whether the client should stop waiting for further messages.
    pub fn is_terminal(&self) -> bool {
        match self.loop_tag {
            LoopTag::FinalStatus | LoopTag::ConnectionError => true,
            LoopTag::VerifyPayload => self.status == TaskState::Failed,
            LoopTag::Balance | LoopTag::PlaceOrder | LoopTag::OrderStatus => false,
        }
    }
}

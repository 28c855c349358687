//! Observer invoked on every state transition of a running plan.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::DebugLevel;
use crate::domain::entities::action_log::{ActionLogEntry, LoopTag};
use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::trade_plan::TaskState;

/// Event produced by a running plan.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// One step of a balance check or an order run
    Step(ActionLogEntry),
    /// Authoritative outcome of the whole plan
    Final(TaskState),
}

#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, event: ProgressEvent);
}

/// Reporter backed by an mpsc channel drained by the session.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl ProgressReporter for ChannelReporter {
    async fn report(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            warn!("Progress receiver dropped, event discarded");
        }
    }
}

/// Per-run reporting state shared by every task of one plan execution.
#[derive(Clone)]
pub struct RunContext {
    pub trade_plan_id: i64,
    /// Groups the audit rows of this run
    pub start_time: DateTime<Utc>,
    pub debug_level: DebugLevel,
    reporter: Arc<dyn ProgressReporter>,
}

impl RunContext {
    pub fn new(
        trade_plan_id: i64,
        debug_level: DebugLevel,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            trade_plan_id,
            start_time: Utc::now(),
            debug_level,
            reporter,
        }
    }

    pub fn entry(
        &self,
        exchange: &Exchange,
        hop_index: usize,
        loop_tag: LoopTag,
        status: TaskState,
    ) -> ActionLogEntry {
        ActionLogEntry::new(
            self.trade_plan_id,
            self.start_time,
            exchange.clone(),
            hop_index,
            loop_tag,
            status,
        )
    }

    /// Attach the adapter's raw payload when the debug level records it.
    pub fn attach_raw(&self, entry: ActionLogEntry, raw: Option<&Value>) -> ActionLogEntry {
        match raw {
            Some(raw) if self.debug_level.records_raw() => entry.with_detail("raw", raw.clone()),
            _ => entry,
        }
    }

    pub async fn emit(&self, entry: ActionLogEntry) {
        self.reporter.report(ProgressEvent::Step(entry)).await;
    }

    pub async fn finish(&self, status: TaskState) {
        self.reporter.report(ProgressEvent::Final(status)).await;
    }
}

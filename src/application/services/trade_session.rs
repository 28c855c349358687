//! TradeSession - accepts one trade request, drives the coordinator on a
//! worker task and relays every progress event to the client and the audit
//! store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::DebugLevel;
use crate::domain::entities::action_log::{ActionLogEntry, LoopTag, ProgressMessage};
use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::trade_plan::TaskState;
use crate::domain::errors::TaskError;
use crate::domain::repositories::audit_store::AuditStore;
use crate::domain::services::progress::{ChannelReporter, ProgressEvent, RunContext};
use crate::domain::services::trade_plan_compiler::{TradePlanCompiler, TradeRequest};
use crate::application::services::execution_coordinator::ExecutionCoordinator;

/// Outcome of one request, as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Set once the plan was persisted
    pub trade_plan_id: Option<i64>,
    pub status: TaskState,
}

#[derive(Clone)]
pub struct TradeSession {
    store: Arc<dyn AuditStore>,
    coordinator: Arc<ExecutionCoordinator>,
    debug_level: DebugLevel,
}

impl TradeSession {
    pub fn new(
        store: Arc<dyn AuditStore>,
        coordinator: Arc<ExecutionCoordinator>,
        debug_level: DebugLevel,
    ) -> Self {
        Self {
            store,
            coordinator,
            debug_level,
        }
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Handle one raw JSON request, sending every progress message to
    /// `outbound`. Returns once the plan has resolved.
    pub async fn handle_request(
        &self,
        payload: &str,
        outbound: &mpsc::UnboundedSender<ProgressMessage>,
    ) -> SessionOutcome {
        let compiled = match TradeRequest::from_json(payload)
            .and_then(|request| TradePlanCompiler::compile(&request))
        {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!("Rejected trade request: {}", e);
                send(outbound, ProgressMessage::payload_error(&e.to_string()));
                return SessionOutcome {
                    trade_plan_id: None,
                    status: TaskState::Failed,
                };
            }
        };

        let plan = match self.store.create_trade_plan(compiled.plan).await {
            Ok(plan) => plan,
            Err(e) => {
                error!("Failed to create trade plan: {}", e);
                let mut message = ProgressMessage::connection_error();
                message
                    .fields
                    .insert("error".to_string(), e.to_string().into());
                send(outbound, message);
                return SessionOutcome {
                    trade_plan_id: None,
                    status: TaskState::Failed,
                };
            }
        };
        info!(
            "Trade plan {} created for user {} ({} sub-loops)",
            plan.id,
            plan.owner_id,
            compiled.sub_loops.len()
        );

        let (reporter, mut events) = ChannelReporter::channel();
        let context = RunContext::new(plan.id, self.debug_level, Arc::new(reporter));
        let start_time = context.start_time;

        let coordinator = self.coordinator.clone();
        let run_plan = plan.clone();
        let sub_loops = compiled.sub_loops;
        let run = tokio::spawn(async move {
            coordinator.execute(&run_plan, sub_loops, context).await
        });

        // Ends once the coordinator and all of its tasks dropped their reporters.
        while let Some(event) = events.recv().await {
            self.relay(plan.id, event, outbound).await;
        }

        let failure = match run.await {
            Ok(Ok(status)) => {
                return SessionOutcome {
                    trade_plan_id: Some(plan.id),
                    status,
                }
            }
            Ok(Err(e)) => e,
            Err(e) => TaskError::WorkerAborted(e.to_string()),
        };

        error!("Trade plan {} aborted: {}", plan.id, failure);
        let entry = ActionLogEntry::new(
            plan.id,
            start_time,
            Exchange::new(""),
            0,
            LoopTag::ConnectionError,
            TaskState::Failed,
        )
        .with_detail("error", failure.to_string());

        self.persist_step(&entry).await;
        self.persist_status(plan.id, TaskState::Failed).await;
        send(outbound, entry.to_message());

        SessionOutcome {
            trade_plan_id: Some(plan.id),
            status: TaskState::Failed,
        }
    }

    async fn relay(
        &self,
        trade_plan_id: i64,
        event: ProgressEvent,
        outbound: &mpsc::UnboundedSender<ProgressMessage>,
    ) {
        match event {
            ProgressEvent::Step(entry) => {
                self.persist_step(&entry).await;
                self.persist_status(trade_plan_id, entry.status).await;

                let mut message = entry.to_message();
                if !self.debug_level.relays_raw() {
                    message.fields.remove("raw");
                }
                send(outbound, message);
            }
            ProgressEvent::Final(status) => {
                self.persist_status(trade_plan_id, status).await;
                send(outbound, ProgressMessage::final_status(status));
            }
        }
    }

    async fn persist_step(&self, entry: &ActionLogEntry) {
        if let Err(e) = self.store.append_action_log(entry).await {
            error!(
                "Failed to persist {} entry for trade plan {}: {}",
                entry.loop_tag.as_str(),
                entry.trade_plan_id,
                e
            );
        }
    }

    async fn persist_status(&self, trade_plan_id: i64, status: TaskState) {
        if let Err(e) = self.store.update_status(trade_plan_id, status).await {
            error!(
                "Failed to set trade plan {} status to {}: {}",
                trade_plan_id, status, e
            );
        }
    }
}

fn send(outbound: &mpsc::UnboundedSender<ProgressMessage>, message: ProgressMessage) {
    if outbound.send(message).is_err() {
        debug!("Client gone, progress message not delivered");
    }
}

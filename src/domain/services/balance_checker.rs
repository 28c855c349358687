//! BalanceChecker - single-shot funds check before a sub-loop trades.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::entities::action_log::LoopTag;
use crate::domain::entities::trade_plan::{SubLoop, TaskState};
use crate::domain::errors::TaskError;
use crate::domain::repositories::exchange_client::ExchangeClient;
use crate::domain::services::progress::RunContext;

pub struct BalanceChecker {
    client: Arc<dyn ExchangeClient>,
    context: RunContext,
}

impl BalanceChecker {
    pub fn new(client: Arc<dyn ExchangeClient>, context: RunContext) -> Self {
        Self { client, context }
    }

    /// `Ok(true)` when the exchange holds at least the sub-loop's starting
    /// amount of its working currency. No retry: an adapter error fails the
    /// check. Transport failures are returned as `TaskError`.
    pub async fn check(&self, sub_loop: &SubLoop) -> Result<bool, TaskError> {
        let entry = self
            .context
            .entry(&sub_loop.exchange, 0, LoopTag::Balance, TaskState::Progress)
            .with_detail("currency", sub_loop.currency.as_str())
            .with_detail("required", sub_loop.starting_amount.to_string());

        let response = match self.client.balance(&sub_loop.currency).await {
            Ok(response) => response,
            Err(e) if e.is_connection_error() => {
                return Err(TaskError::from_exchange(sub_loop.exchange.name(), &e));
            }
            Err(e) => {
                warn!(
                    "Balance query on {} for {} failed: {}",
                    sub_loop.exchange, sub_loop.currency, e
                );
                let mut entry = entry.with_detail("error", e.to_string());
                entry.status = TaskState::Failed;
                self.context.emit(entry).await;
                return Ok(false);
            }
        };

        let sufficient = response.available >= sub_loop.starting_amount;
        let mut entry = self
            .context
            .attach_raw(entry.with_details(response.to_details()), response.raw.as_ref());

        if sufficient {
            info!(
                "Balance on {}: {} {} available, {} required",
                sub_loop.exchange, response.available, sub_loop.currency, sub_loop.starting_amount
            );
        } else {
            warn!(
                "Insufficient balance on {}: {} {} available, {} required",
                sub_loop.exchange, response.available, sub_loop.currency, sub_loop.starting_amount
            );
            entry.status = TaskState::Failed;
            entry = entry.with_detail("error", "Insufficient balance");
        }

        self.context.emit(entry).await;
        Ok(sufficient)
    }
}

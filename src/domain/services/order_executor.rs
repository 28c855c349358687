//! OrderExecutor service - runs one sub-loop's hops as market orders
//!
//! Each hop goes through PLACE_ORDER and POLL_STATUS until the order
//! completes (advance to the next hop, carrying the realized proceeds), is
//! canceled (re-place the same hop, bounded by `RetryPolicy::order_count`) or
//! the adapter reports an error (sub-loop fails). Polling is bounded by
//! `RetryPolicy::status_loop_count`; an order still open after the last poll
//! is cancelled and handled like a canceled order.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::domain::entities::action_log::LoopTag;
use crate::domain::entities::hop::Hop;
use crate::domain::entities::order::{CurrencyPair, OrderRequest, OrderSide};
use crate::domain::entities::trade_plan::{SubLoop, TaskState};
use crate::domain::errors::TaskError;
use crate::domain::repositories::exchange_client::{
    ExchangeClient, ExchangeError, OrderStatus, OrderStatusResponse,
};
use crate::domain::services::market_catalog::MarketCatalog;
use crate::domain::services::progress::RunContext;
use crate::domain::value_objects::amount::Amount;

/// Result of waiting on one placed order.
#[derive(Debug)]
enum PollOutcome {
    Completed(OrderStatusResponse),
    /// Canceled by the exchange or by us after the last poll
    Canceled {
        details: Map<String, Value>,
        raw: Option<Value>,
    },
    /// Adapter error, already reported
    Failed,
}

/// One placement attempt of a hop.
struct Attempt<'a> {
    sub_loop: &'a SubLoop,
    hop_index: usize,
    retry_count: u32,
}

pub struct OrderExecutor {
    client: Arc<dyn ExchangeClient>,
    catalog: Arc<MarketCatalog>,
    policy: RetryPolicy,
    context: RunContext,
}

impl OrderExecutor {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        catalog: Arc<MarketCatalog>,
        policy: RetryPolicy,
        context: RunContext,
    ) -> Self {
        Self {
            client,
            catalog,
            policy,
            context,
        }
    }

    /// Run every hop of `sub_loop` in order.
    ///
    /// Returns `Ok(true)` when the last hop completed, `Ok(false)` when the
    /// sub-loop reached FAILED. Transport failures end the run with a
    /// `TaskError` instead of a FAILED transition.
    pub async fn run(&self, sub_loop: &SubLoop) -> Result<bool, TaskError> {
        info!(
            "Starting sub-loop {} on {} with {} {}",
            sub_loop.index, sub_loop.exchange, sub_loop.starting_amount, sub_loop.currency
        );

        let mut amount = sub_loop.starting_amount.clone();
        for (hop_index, hop) in sub_loop.hops.iter().enumerate() {
            match self.execute_hop(sub_loop, hop_index, hop, &amount).await? {
                Some(proceeds) => amount = proceeds,
                None => {
                    warn!(
                        "Sub-loop {} on {} failed at hop {} ({})",
                        sub_loop.index, sub_loop.exchange, hop_index, hop
                    );
                    return Ok(false);
                }
            }
        }

        info!(
            "Sub-loop {} on {} finished with {} {}",
            sub_loop.index,
            sub_loop.exchange,
            amount,
            sub_loop.hops.last().map(|h| h.to_currency.as_str()).unwrap_or_default()
        );
        Ok(true)
    }

    /// Drive one hop to completion. `Ok(Some(proceeds))` on completion,
    /// `Ok(None)` once a FAILED transition was reported.
    async fn execute_hop(
        &self,
        sub_loop: &SubLoop,
        hop_index: usize,
        hop: &Hop,
        amount: &Amount,
    ) -> Result<Option<Amount>, TaskError> {
        let mut attempt = Attempt {
            sub_loop,
            hop_index,
            retry_count: 0,
        };

        let Some((pair, side)) = self.catalog.resolve(hop) else {
            let error = ExchangeError::UnsupportedPair(format!(
                "{} lists neither {}-{} nor {}-{}",
                hop.exchange, hop.from_currency, hop.to_currency, hop.to_currency, hop.from_currency
            ));
            self.report_failure(&attempt, LoopTag::PlaceOrder, &error, Map::new())
                .await;
            return Ok(None);
        };

        loop {
            let Some(order_id) = self.place(&attempt, &pair, side, amount).await? else {
                return Ok(None);
            };

            match self.await_fill(&attempt, &order_id).await? {
                PollOutcome::Completed(response) => {
                    return self.complete(&attempt, response).await;
                }
                PollOutcome::Canceled { details, raw } => {
                    attempt.retry_count += 1;
                    let status = if attempt.retry_count >= self.policy.order_count {
                        TaskState::Failed
                    } else {
                        TaskState::Progress
                    };

                    let mut entry = self.step(&attempt, LoopTag::OrderStatus, status);
                    entry = self.context.attach_raw(entry.with_details(details), raw.as_ref());
                    if status == TaskState::Failed {
                        entry = entry.with_detail(
                            "error",
                            format!("Order canceled {} times", attempt.retry_count),
                        );
                    }
                    self.context.emit(entry).await;

                    if status == TaskState::Failed {
                        return Ok(None);
                    }
                    debug!(
                        "Re-placing hop {} of sub-loop {} (retry {})",
                        hop_index, sub_loop.index, attempt.retry_count
                    );
                }
                PollOutcome::Failed => return Ok(None),
            }
        }
    }

    /// PLACE_ORDER. `Ok(None)` when the adapter rejected the order.
    async fn place(
        &self,
        attempt: &Attempt<'_>,
        pair: &CurrencyPair,
        side: OrderSide,
        amount: &Amount,
    ) -> Result<Option<String>, TaskError> {
        let order = OrderRequest {
            pair: pair.clone(),
            side,
            amount: amount.clone(),
        };
        let mut details = Map::new();
        details.insert("pair".to_string(), Value::from(pair.to_string()));
        details.insert("side".to_string(), Value::from(side.to_string()));
        details.insert("amount".to_string(), Value::from(amount.to_string()));

        match self.client.place_order(&order).await {
            Ok(response) => {
                let entry = self
                    .step(attempt, LoopTag::PlaceOrder, TaskState::Progress)
                    .with_details(details)
                    .with_details(response.to_details());
                let entry = self.context.attach_raw(entry, response.raw.as_ref());
                self.context.emit(entry).await;
                Ok(Some(response.order_id))
            }
            Err(e) if e.is_connection_error() => Err(self.transport(attempt, &e)),
            Err(e) => {
                self.report_failure(attempt, LoopTag::PlaceOrder, &e, details)
                    .await;
                Ok(None)
            }
        }
    }

    /// POLL_STATUS, then cancel if the order is still open.
    async fn await_fill(
        &self,
        attempt: &Attempt<'_>,
        order_id: &str,
    ) -> Result<PollOutcome, TaskError> {
        for poll in 0..self.policy.status_loop_count {
            if poll > 0 {
                tokio::time::sleep(self.policy.status_interval).await;
            }

            match self.client.order_status(order_id).await {
                Ok(response) => match response.status {
                    OrderStatus::Completed => return Ok(PollOutcome::Completed(response)),
                    OrderStatus::Canceled => {
                        return Ok(PollOutcome::Canceled {
                            details: response.to_details(),
                            raw: response.raw,
                        })
                    }
                    OrderStatus::Pending | OrderStatus::PartiallyFilled => {
                        debug!(
                            "Order {} still {} after poll {}",
                            order_id,
                            response.status,
                            poll + 1
                        );
                    }
                },
                Err(e) if e.is_connection_error() => return Err(self.transport(attempt, &e)),
                Err(e) => {
                    let mut details = Map::new();
                    details.insert("order_id".to_string(), Value::from(order_id));
                    self.report_failure(attempt, LoopTag::OrderStatus, &e, details)
                        .await;
                    return Ok(PollOutcome::Failed);
                }
            }
        }

        info!(
            "Order {} not filled after {} polls, cancelling",
            order_id, self.policy.status_loop_count
        );
        match self.client.cancel_order(order_id).await {
            Ok(response) => Ok(PollOutcome::Canceled {
                details: response.to_details(),
                raw: response.raw,
            }),
            Err(e) if e.is_connection_error() => Err(self.transport(attempt, &e)),
            Err(e) => {
                let mut details = Map::new();
                details.insert("order_id".to_string(), Value::from(order_id));
                self.report_failure(attempt, LoopTag::OrderStatus, &e, details)
                    .await;
                Ok(PollOutcome::Failed)
            }
        }
    }

    /// Order completed: STEP_PASSED, or SUCCESS on the sub-loop's last hop.
    async fn complete(
        &self,
        attempt: &Attempt<'_>,
        response: OrderStatusResponse,
    ) -> Result<Option<Amount>, TaskError> {
        let Some(proceeds) = response.net_proceeds.clone() else {
            let error = ExchangeError::OrderStatusFailed(format!(
                "Order {} completed without net proceeds",
                response.order_id
            ));
            self.report_failure(attempt, LoopTag::OrderStatus, &error, response.to_details())
                .await;
            return Ok(None);
        };

        let status = if attempt.sub_loop.is_last_hop(attempt.hop_index) {
            TaskState::Success
        } else {
            TaskState::StepPassed
        };
        let entry = self
            .step(attempt, LoopTag::OrderStatus, status)
            .with_details(response.to_details());
        let entry = self.context.attach_raw(entry, response.raw.as_ref());
        self.context.emit(entry).await;

        Ok(Some(proceeds))
    }

    fn step(
        &self,
        attempt: &Attempt<'_>,
        loop_tag: LoopTag,
        status: TaskState,
    ) -> crate::domain::entities::action_log::ActionLogEntry {
        self.context
            .entry(&attempt.sub_loop.exchange, attempt.hop_index, loop_tag, status)
            .with_retry_count(attempt.retry_count)
    }

    async fn report_failure(
        &self,
        attempt: &Attempt<'_>,
        loop_tag: LoopTag,
        error: &ExchangeError,
        details: Map<String, Value>,
    ) {
        warn!(
            "{} failed on {} hop {}: {}",
            loop_tag.as_str(),
            attempt.sub_loop.exchange,
            attempt.hop_index,
            error
        );
        let entry = self
            .step(attempt, loop_tag, TaskState::Failed)
            .with_details(details)
            .with_detail("error", error.to_string());
        self.context.emit(entry).await;
    }

    fn transport(&self, attempt: &Attempt<'_>, error: &ExchangeError) -> TaskError {
        warn!(
            "Connection lost on {} at hop {}: {}",
            attempt.sub_loop.exchange, attempt.hop_index, error
        );
        TaskError::from_exchange(attempt.sub_loop.exchange.name(), error)
    }
}

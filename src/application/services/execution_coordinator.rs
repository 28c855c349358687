//! ExecutionCoordinator - sequences balance checks and sub-loop runs of one
//! trade plan on the worker pool and decides the plan's final status.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RetryPolicy;
use crate::domain::entities::action_log::LoopTag;
use crate::domain::entities::trade_plan::{ExecutionMode, SubLoop, TaskState, TradePlan};
use crate::domain::errors::TaskError;
use crate::domain::repositories::exchange_client::ExchangeError;
use crate::domain::services::balance_checker::BalanceChecker;
use crate::domain::services::market_catalog::MarketCatalog;
use crate::domain::services::order_executor::OrderExecutor;
use crate::domain::services::progress::RunContext;
use crate::infrastructure::exchange_client_factory::ExchangeRegistry;
use crate::task_runner::{TaskResult, WorkerPool, WorkerTask};

pub struct ExecutionCoordinator {
    registry: Arc<ExchangeRegistry>,
    catalog: Arc<MarketCatalog>,
    policy: RetryPolicy,
    pool: WorkerPool,
}

impl ExecutionCoordinator {
    pub fn new(
        registry: Arc<ExchangeRegistry>,
        catalog: Arc<MarketCatalog>,
        policy: RetryPolicy,
        pool: WorkerPool,
    ) -> Self {
        Self {
            registry,
            catalog,
            policy,
            pool,
        }
    }

    /// Run `plan` and report its FINAL_STATUS through `context`.
    ///
    /// Every dispatched task is awaited before returning. If any of them
    /// ended with a transport failure the first such `TaskError` is returned
    /// and no final status is reported.
    pub async fn execute(
        &self,
        plan: &TradePlan,
        sub_loops: Vec<SubLoop>,
        context: RunContext,
    ) -> Result<TaskState, TaskError> {
        info!(
            "Executing trade plan {} ({} sub-loops, {}, check_balance={})",
            plan.id,
            sub_loops.len(),
            plan.execution_mode.as_str(),
            plan.check_balance
        );

        if plan.check_balance {
            let checks = sub_loops
                .iter()
                .map(|sub_loop| self.balance_task(sub_loop.clone(), context.clone()))
                .collect();
            let results = self.pool.run_group(checks).await;

            if !all_succeeded(results)? {
                warn!(
                    "Trade plan {} failed its balance check, no orders placed",
                    plan.id
                );
                context.finish(TaskState::Failed).await;
                return Ok(TaskState::Failed);
            }
        }

        let runs = sub_loops
            .into_iter()
            .map(|sub_loop| self.order_task(sub_loop, context.clone()))
            .collect();

        let succeeded = match plan.execution_mode {
            ExecutionMode::Parallel => all_succeeded(self.pool.run_group(runs).await)?,
            ExecutionMode::Sequential => last_succeeded(self.pool.run_chain(runs).await)?,
        };

        let status = if succeeded {
            TaskState::Completed
        } else {
            TaskState::Failed
        };
        info!("Trade plan {} finished: {}", plan.id, status);
        context.finish(status).await;
        Ok(status)
    }

    fn balance_task(&self, sub_loop: SubLoop, context: RunContext) -> WorkerTask {
        let name = format!("balance {} on {}", sub_loop.index, sub_loop.exchange);
        match self.registry.get(&sub_loop.exchange) {
            Ok(client) => {
                let checker = BalanceChecker::new(client, context);
                WorkerTask::new(name, async move { checker.check(&sub_loop).await })
            }
            Err(e) => WorkerTask::new(
                name,
                report_unconfigured(context, sub_loop, LoopTag::Balance, e),
            ),
        }
    }

    fn order_task(&self, sub_loop: SubLoop, context: RunContext) -> WorkerTask {
        let name = format!("sub-loop {} on {}", sub_loop.index, sub_loop.exchange);
        match self.registry.get(&sub_loop.exchange) {
            Ok(client) => {
                let executor =
                    OrderExecutor::new(client, self.catalog.clone(), self.policy, context);
                WorkerTask::new(name, async move { executor.run(&sub_loop).await })
            }
            Err(e) => WorkerTask::new(
                name,
                report_unconfigured(context, sub_loop, LoopTag::PlaceOrder, e),
            ),
        }
    }
}

async fn report_unconfigured(
    context: RunContext,
    sub_loop: SubLoop,
    loop_tag: LoopTag,
    error: ExchangeError,
) -> TaskResult {
    warn!("Sub-loop {} cannot run: {}", sub_loop.index, error);
    let entry = context
        .entry(&sub_loop.exchange, 0, loop_tag, TaskState::Failed)
        .with_detail("error", error.to_string());
    context.emit(entry).await;
    Ok(false)
}

/// Logical AND over every result; the first transport failure wins.
fn all_succeeded(results: Vec<TaskResult>) -> Result<bool, TaskError> {
    let mut succeeded = true;
    for result in results {
        succeeded &= result?;
    }
    Ok(succeeded)
}

/// Outcome of the final link of a chain.
fn last_succeeded(results: Vec<TaskResult>) -> Result<bool, TaskError> {
    let mut last = false;
    for result in results {
        last = result?;
    }
    Ok(last)
}

//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, One};
use serde_json::json;
use tokio::sync::mpsc;

use pankow::application::services::execution_coordinator::ExecutionCoordinator;
use pankow::application::services::trade_session::{SessionOutcome, TradeSession};
use pankow::config::{DebugLevel, RetryPolicy};
use pankow::domain::entities::action_log::ProgressMessage;
use pankow::domain::entities::order::OrderRequest;
use pankow::domain::repositories::audit_store::AuditStore;
use pankow::domain::repositories::exchange_client::{
    BalanceResponse, CancelOrderResponse, ExchangeClient, ExchangeError, ExchangeResult,
    OrderStatus, OrderStatusResponse, PlaceOrderResponse,
};
use pankow::domain::services::market_catalog::MarketCatalog;
use pankow::domain::value_objects::amount::Amount;
use pankow::infrastructure::exchange_client_factory::ExchangeRegistry;
use pankow::persistence::repository::SqliteAuditStore;
use pankow::persistence::{init_database, DatabaseConfig};
use pankow::task_runner::WorkerPool;

/// How a `TestExchange` answers status polls.
#[derive(Debug, Clone, Copy)]
pub enum Fill {
    Instant,
    AlwaysCanceled,
    NeverTerminal,
}

/// Exchange adapter with fixed behaviour and call counters.
pub struct TestExchange {
    name: String,
    balances: HashMap<String, Amount>,
    fill: Fill,
    /// 1-based place call that fails, and how
    failing_place: Option<(usize, ExchangeError)>,
    places: AtomicUsize,
    polls: AtomicUsize,
    cancels: AtomicUsize,
    /// Net proceeds of a fill are `amount * fill_ratio`
    fill_ratio: BigDecimal,
    placed_amounts: Mutex<Vec<Amount>>,
}

impl TestExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            balances: HashMap::new(),
            fill: Fill::Instant,
            failing_place: None,
            places: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            fill_ratio: BigDecimal::one(),
            placed_amounts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(mut self, currency: &str, available: &str) -> Self {
        self.balances
            .insert(currency.to_string(), Amount::parse(available).unwrap());
        self
    }

    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_fill_ratio(mut self, ratio: &str) -> Self {
        self.fill_ratio = ratio.parse().unwrap();
        self
    }

    pub fn failing_place(mut self, call: usize, error: ExchangeError) -> Self {
        self.failing_place = Some((call, error));
        self
    }

    pub fn placed_amounts(&self) -> Vec<Amount> {
        self.placed_amounts.lock().unwrap().clone()
    }

    pub fn places(&self) -> usize {
        self.places.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeClient for TestExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn balance(&self, currency: &str) -> ExchangeResult<BalanceResponse> {
        Ok(BalanceResponse {
            currency: currency.to_string(),
            available: self.balances.get(currency).cloned().unwrap_or_else(Amount::zero),
            raw: None,
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> ExchangeResult<PlaceOrderResponse> {
        let call = self.places.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((failing, error)) = &self.failing_place {
            if *failing == call {
                return Err(error.clone());
            }
        }
        self.placed_amounts
            .lock()
            .unwrap()
            .push(order.amount.clone());

        let order_id = format!("{}-{}", self.name, call);
        Ok(PlaceOrderResponse {
            raw: Some(json!({"id": order_id, "venue": self.name})),
            order_id,
        })
    }

    async fn order_status(&self, order_id: &str) -> ExchangeResult<OrderStatusResponse> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let (status, net_proceeds) = match self.fill {
            Fill::Instant => (
                OrderStatus::Completed,
                self.placed_amounts
                    .lock()
                    .unwrap()
                    .last()
                    .map(|amount| amount.multiply(&self.fill_ratio).unwrap()),
            ),
            Fill::AlwaysCanceled => (OrderStatus::Canceled, None),
            Fill::NeverTerminal => (OrderStatus::Pending, None),
        };
        Ok(OrderStatusResponse {
            order_id: order_id.to_string(),
            status,
            net_proceeds,
            raw: None,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelOrderResponse> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(CancelOrderResponse {
            order_id: order_id.to_string(),
            raw: None,
        })
    }
}

/// `ex1` and `ex2` both list BTC-USD.
pub fn catalog() -> MarketCatalog {
    MarketCatalog::from_json_str(
        r#"{
            "ex1": [{"base": "BTC", "quote": "USD", "price": "50000"}],
            "ex2": [{"base": "BTC", "quote": "USD", "price": "50000"}]
        }"#,
    )
    .unwrap()
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        order_count: 5,
        status_interval: Duration::from_millis(1),
        status_loop_count: 5,
    }
}

pub struct Harness {
    pub session: TradeSession,
    pub store: Arc<dyn AuditStore>,
}

pub async fn harness(
    exchanges: Vec<(&str, Arc<TestExchange>)>,
    debug_level: DebugLevel,
) -> Harness {
    let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();
    let store: Arc<dyn AuditStore> = Arc::new(SqliteAuditStore::new(pool));

    let registry = exchanges
        .into_iter()
        .fold(ExchangeRegistry::new(), |registry, (name, client)| {
            registry.with_client(name, client as Arc<dyn ExchangeClient>)
        });
    let coordinator = Arc::new(ExecutionCoordinator::new(
        Arc::new(registry),
        Arc::new(catalog()),
        fast_policy(),
        WorkerPool::new(4),
    ));

    Harness {
        session: TradeSession::new(store.clone(), coordinator, debug_level),
        store,
    }
}

impl Harness {
    /// Run one request and collect every message sent to the client.
    pub async fn submit(&self, payload: &str) -> (SessionOutcome, Vec<ProgressMessage>) {
        let (outbound, mut messages) = mpsc::unbounded_channel();
        let outcome = self.session.handle_request(payload, &outbound).await;
        drop(outbound);

        let mut received = Vec::new();
        while let Some(message) = messages.recv().await {
            received.push(message);
        }
        (outcome, received)
    }
}

/// Two sub-loops, USD -> BTC -> USD on `ex1` then on `ex2`.
pub fn round_trip_request(exec_type: &str, check_balance: bool) -> String {
    json!({
        "loop": [
            ["ex1", "USD", "BTC"],
            ["ex1", "BTC", "USD"],
            ["ex2", "USD", "BTC"],
            ["ex2", "BTC", "USD"]
        ],
        "amount": [["ex1", "100"], ["ex2", "50"]],
        "exec_type": exec_type,
        "check_balance": check_balance,
        "user_id": 7
    })
    .to_string()
}

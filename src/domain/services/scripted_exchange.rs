//! Scripted `ExchangeClient` for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, One};
use serde_json::json;

use crate::domain::entities::order::OrderRequest;
use crate::domain::repositories::exchange_client::{
    BalanceResponse, CancelOrderResponse, ExchangeClient, ExchangeError, ExchangeResult,
    OrderStatus, OrderStatusResponse, PlaceOrderResponse,
};
use crate::domain::value_objects::amount::Amount;

/// Answers from scripts, falling back to instant fills at `fill_ratio`
/// (1:1 unless set).
pub struct ScriptedExchange {
    name: String,
    balances: HashMap<String, ExchangeResult<Amount>>,
    place_script: Mutex<VecDeque<ExchangeResult<()>>>,
    status_script: Mutex<VecDeque<ExchangeResult<OrderStatus>>>,
    default_status: OrderStatus,
    cancel_result: ExchangeResult<()>,
    fill_ratio: BigDecimal,
    placed: Mutex<Vec<OrderRequest>>,
    status_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl ScriptedExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            balances: HashMap::new(),
            place_script: Mutex::new(VecDeque::new()),
            status_script: Mutex::new(VecDeque::new()),
            default_status: OrderStatus::Completed,
            cancel_result: Ok(()),
            fill_ratio: BigDecimal::one(),
            placed: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(mut self, currency: &str, available: &str) -> Self {
        self.balances
            .insert(currency.to_string(), Ok(Amount::parse(available).unwrap()));
        self
    }

    pub fn with_balance_error(mut self, currency: &str, error: ExchangeError) -> Self {
        self.balances.insert(currency.to_string(), Err(error));
        self
    }

    pub fn with_place_results(self, results: Vec<ExchangeResult<()>>) -> Self {
        self.place_script.lock().unwrap().extend(results);
        self
    }

    pub fn with_statuses(self, statuses: Vec<ExchangeResult<OrderStatus>>) -> Self {
        self.status_script.lock().unwrap().extend(statuses);
        self
    }

    pub fn with_default_status(mut self, status: OrderStatus) -> Self {
        self.default_status = status;
        self
    }

    pub fn with_cancel_result(mut self, result: ExchangeResult<()>) -> Self {
        self.cancel_result = result;
        self
    }

    /// Completed orders yield `amount * ratio` as net proceeds.
    pub fn with_fill_ratio(mut self, ratio: &str) -> Self {
        self.fill_ratio = ratio.parse().unwrap();
        self
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeClient for ScriptedExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn balance(&self, currency: &str) -> ExchangeResult<BalanceResponse> {
        let available = match self.balances.get(currency) {
            Some(Ok(amount)) => amount.clone(),
            Some(Err(e)) => return Err(e.clone()),
            None => Amount::zero(),
        };
        Ok(BalanceResponse {
            currency: currency.to_string(),
            available,
            raw: Some(json!({"currency": currency})),
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> ExchangeResult<PlaceOrderResponse> {
        let scripted = self.place_script.lock().unwrap().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        let mut placed = self.placed.lock().unwrap();
        placed.push(order.clone());
        let order_id = format!("{}-{}", self.name, placed.len());
        Ok(PlaceOrderResponse {
            raw: Some(json!({"id": order_id})),
            order_id,
        })
    }

    async fn order_status(&self, order_id: &str) -> ExchangeResult<OrderStatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .status_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(self.default_status))?;
        let net_proceeds = match status {
            OrderStatus::Completed => self
                .placed
                .lock()
                .unwrap()
                .last()
                .map(|o| o.amount.multiply(&self.fill_ratio).unwrap()),
            _ => None,
        };
        Ok(OrderStatusResponse {
            order_id: order_id.to_string(),
            status,
            net_proceeds,
            raw: None,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelOrderResponse> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancel_result.clone()?;
        Ok(CancelOrderResponse {
            order_id: order_id.to_string(),
            raw: None,
        })
    }
}

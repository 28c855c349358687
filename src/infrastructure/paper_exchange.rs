//! Paper Exchange Client
//!
//! In-memory simulated exchange. Every currency listed in the catalog for the
//! exchange starts with the same balance; market orders fill immediately at
//! the catalog's reference price, less a proportional fee, truncated to 8
//! decimal places.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bigdecimal::{BigDecimal, One};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::order::{OrderRequest, OrderSide};
use crate::domain::repositories::exchange_client::{
    BalanceResponse, CancelOrderResponse, ExchangeClient, ExchangeError, ExchangeResult,
    OrderStatus, OrderStatusResponse, PlaceOrderResponse,
};
use crate::domain::services::market_catalog::Market;
use crate::domain::value_objects::amount::Amount;

const FILL_SCALE: i64 = 8;

#[derive(Debug, Clone)]
struct PaperOrder {
    status: OrderStatus,
    net_proceeds: Amount,
}

pub struct PaperExchangeClient {
    exchange: Exchange,
    markets: Vec<Market>,
    fee: Amount,
    balances: Mutex<HashMap<String, Amount>>,
    orders: Mutex<HashMap<String, PaperOrder>>,
    next_order_id: AtomicU64,
}

impl PaperExchangeClient {
    pub fn new(
        exchange: Exchange,
        markets: Vec<Market>,
        starting_balance: &Amount,
        fee: Amount,
    ) -> Self {
        let balances = markets
            .iter()
            .flat_map(|m| [m.base.clone(), m.quote.clone()])
            .map(|currency| (currency, starting_balance.clone()))
            .collect();

        info!(
            "Paper exchange {} ready with {} markets, fee {}",
            exchange,
            markets.len(),
            fee
        );

        Self {
            exchange,
            markets,
            fee,
            balances: Mutex::new(balances),
            orders: Mutex::new(HashMap::new()),
            next_order_id: AtomicU64::new(1),
        }
    }

    /// Currency spent and currency received, and the amount received.
    fn fill(&self, order: &OrderRequest) -> ExchangeResult<(String, String, Amount)> {
        let price = self
            .markets
            .iter()
            .find(|m| m.base == order.pair.base && m.quote == order.pair.quote)
            .and_then(|m| m.price.as_ref())
            .ok_or_else(|| ExchangeError::UnsupportedPair(order.pair.to_string()))?;

        let net_rate = BigDecimal::one() - self.fee.value();
        let invalid = |e: crate::domain::errors::ValidationError| {
            ExchangeError::OrderPlacementFailed(e.to_string())
        };

        let (spent, received, gross) = match order.side {
            OrderSide::Sell => (
                order.pair.base.clone(),
                order.pair.quote.clone(),
                order.amount.multiply(price.value()).map_err(invalid)?,
            ),
            OrderSide::Buy => (
                order.pair.quote.clone(),
                order.pair.base.clone(),
                order.amount.divide(price.value()).map_err(invalid)?,
            ),
        };

        let proceeds = gross.multiply(&net_rate).map_err(invalid)?.truncate(FILL_SCALE);
        Ok((spent, received, proceeds))
    }
}

#[async_trait]
impl ExchangeClient for PaperExchangeClient {
    fn name(&self) -> &str {
        self.exchange.name()
    }

    async fn balance(&self, currency: &str) -> ExchangeResult<BalanceResponse> {
        let balances = self.balances.lock().await;
        let available = balances.get(currency).cloned().ok_or_else(|| {
            ExchangeError::BalanceQueryFailed(format!("Unknown currency {}", currency))
        })?;

        Ok(BalanceResponse {
            currency: currency.to_string(),
            raw: Some(json!({"currency": currency, "available": available.to_string()})),
            available,
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> ExchangeResult<PlaceOrderResponse> {
        if !order.amount.is_positive() {
            return Err(ExchangeError::OrderPlacementFailed(
                "Order size must be positive".to_string(),
            ));
        }

        let (spent, received, proceeds) = self.fill(order)?;

        {
            let mut balances = self.balances.lock().await;
            let available = balances.get(&spent).cloned().unwrap_or_else(Amount::zero);
            let remaining = available.subtract(&order.amount).map_err(|_| {
                ExchangeError::OrderPlacementFailed(format!(
                    "Insufficient funds: {} {} available, {} required",
                    available, spent, order.amount
                ))
            })?;
            let credited = balances
                .get(&received)
                .cloned()
                .unwrap_or_else(Amount::zero)
                .add(&proceeds);
            balances.insert(spent.clone(), remaining);
            balances.insert(received.clone(), credited);
        }

        let order_id = format!(
            "{}-{}",
            self.exchange,
            self.next_order_id.fetch_add(1, Ordering::SeqCst)
        );
        self.orders.lock().await.insert(
            order_id.clone(),
            PaperOrder {
                status: OrderStatus::Completed,
                net_proceeds: proceeds.clone(),
            },
        );

        debug!(
            "Paper fill {} on {}: {} {} {} -> {} {}",
            order_id, self.exchange, order.side, order.amount, spent, proceeds, received
        );

        Ok(PlaceOrderResponse {
            raw: Some(json!({
                "id": order_id,
                "product_id": order.pair.to_string(),
                "side": order.side.to_string(),
                "size": order.amount.to_string(),
            })),
            order_id,
        })
    }

    async fn order_status(&self, order_id: &str) -> ExchangeResult<OrderStatusResponse> {
        let orders = self.orders.lock().await;
        let order = orders
            .get(order_id)
            .ok_or_else(|| ExchangeError::OrderStatusFailed(format!("Unknown order {}", order_id)))?;

        Ok(OrderStatusResponse {
            order_id: order_id.to_string(),
            status: order.status,
            net_proceeds: Some(order.net_proceeds.clone()),
            raw: Some(json!({
                "id": order_id,
                "status": order.status.as_str(),
                "executed_value": order.net_proceeds.to_string(),
            })),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelOrderResponse> {
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(order_id).ok_or_else(|| {
            ExchangeError::OrderCancellationFailed(format!("Unknown order {}", order_id))
        })?;

        match order.status {
            OrderStatus::Completed | OrderStatus::Canceled => {
                Err(ExchangeError::OrderCancellationFailed(format!(
                    "Order {} already {}",
                    order_id, order.status
                )))
            }
            OrderStatus::Pending | OrderStatus::PartiallyFilled => {
                order.status = OrderStatus::Canceled;
                Ok(CancelOrderResponse {
                    order_id: order_id.to_string(),
                    raw: None,
                })
            }
        }
    }
}

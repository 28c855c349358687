//! Exchange Client Trait
//!
//! This module defines the `ExchangeClient` trait, the capability set every
//! exchange adapter provides to the trade executor: balance lookup, market
//! order placement, order status polling and order cancellation.
//!
//! ## Error model
//! A non-OK exchange result is returned as an `ExchangeError` carrying the
//! exchange's message. Genuine transport failures are the distinguished
//! `ExchangeError::Connection` value, which callers report as an
//! infrastructure failure rather than a trade failure.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::entities::order::OrderRequest;
use crate::domain::value_objects::amount::Amount;

/// Common result type for exchange operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Errors that can occur during exchange operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Balance query failed: {0}")]
    BalanceQueryFailed(String),

    #[error("Order placement failed: {0}")]
    OrderPlacementFailed(String),

    #[error("Order status query failed: {0}")]
    OrderStatusFailed(String),

    #[error("Order cancellation failed: {0}")]
    OrderCancellationFailed(String),

    #[error("Unsupported pair: {0}")]
    UnsupportedPair(String),

    #[error("Exchange not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl ExchangeError {
    /// Transport failures are not trade outcomes.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ExchangeError::Connection(_))
    }
}

/// Order status reported by an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceResponse {
    pub currency: String,
    pub available: Amount,
    /// Exchange payload, kept for debugging
    pub raw: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrderResponse {
    pub order_id: String,
    pub raw: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub status: OrderStatus,
    /// Realized output of a completed order, in the hop's target currency
    pub net_proceeds: Option<Amount>,
    pub raw: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelOrderResponse {
    pub order_id: String,
    pub raw: Option<Value>,
}

impl BalanceResponse {
    pub fn to_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("currency".to_string(), Value::from(self.currency.clone()));
        details.insert("available".to_string(), Value::from(self.available.to_string()));
        details
    }
}

impl PlaceOrderResponse {
    pub fn to_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("order_id".to_string(), Value::from(self.order_id.clone()));
        details
    }
}

impl OrderStatusResponse {
    pub fn to_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("order_id".to_string(), Value::from(self.order_id.clone()));
        details.insert("order_status".to_string(), Value::from(self.status.as_str()));
        if let Some(net_proceeds) = &self.net_proceeds {
            details.insert("net_proceeds".to_string(), Value::from(net_proceeds.to_string()));
        }
        details
    }
}

impl CancelOrderResponse {
    pub fn to_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("order_id".to_string(), Value::from(self.order_id.clone()));
        details.insert(
            "order_status".to_string(),
            Value::from(OrderStatus::Canceled.as_str()),
        );
        details
    }
}

/// Exchange client trait providing common interface for all exchanges
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Get the name of this exchange
    fn name(&self) -> &str;

    /// Available balance for one currency
    async fn balance(&self, currency: &str) -> ExchangeResult<BalanceResponse>;

    /// Place a market order
    ///
    /// # Returns
    /// The exchange-assigned order ID
    async fn place_order(&self, order: &OrderRequest) -> ExchangeResult<PlaceOrderResponse>;

    /// Get the status of an order
    async fn order_status(&self, order_id: &str) -> ExchangeResult<OrderStatusResponse>;

    /// Cancel an order
    async fn cancel_order(&self, order_id: &str) -> ExchangeResult<CancelOrderResponse>;

    /// Check if the exchange client is healthy and connected
    async fn is_healthy(&self) -> bool {
        true
    }
}

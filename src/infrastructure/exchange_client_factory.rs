//! Exchange Client Factory
//!
//! Clients are created once at startup and shared by every session through
//! the `ExchangeRegistry`.

use crate::config::PankowConfig;
use crate::domain::entities::exchange::Exchange;
use crate::domain::repositories::exchange_client::{ExchangeClient, ExchangeError};
use crate::domain::services::market_catalog::MarketCatalog;
use crate::infrastructure::paper_exchange::PaperExchangeClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Exchange name to adapter lookup
#[derive(Clone, Default)]
pub struct ExchangeRegistry {
    clients: HashMap<Exchange, Arc<dyn ExchangeClient>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, exchange: Exchange, client: Arc<dyn ExchangeClient>) {
        if self.clients.insert(exchange.clone(), client).is_some() {
            warn!("Replacing exchange client for {}", exchange);
        }
    }

    pub fn with_client(mut self, exchange: impl Into<Exchange>, client: Arc<dyn ExchangeClient>) -> Self {
        self.register(exchange.into(), client);
        self
    }

    pub fn get(&self, exchange: &Exchange) -> Result<Arc<dyn ExchangeClient>, ExchangeError> {
        self.clients
            .get(exchange)
            .cloned()
            .ok_or_else(|| ExchangeError::NotConfigured(exchange.to_string()))
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        let mut exchanges: Vec<Exchange> = self.clients.keys().cloned().collect();
        exchanges.sort();
        exchanges
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Factory for creating exchange clients
pub struct ExchangeClientFactory;

impl ExchangeClientFactory {
    /// One paper client per exchange listed in the catalog.
    pub fn create_all(catalog: &MarketCatalog, config: &PankowConfig) -> ExchangeRegistry {
        let mut registry = ExchangeRegistry::new();

        for exchange in catalog.exchanges() {
            let client = PaperExchangeClient::new(
                exchange.clone(),
                catalog.markets(exchange).to_vec(),
                &config.paper_balance,
                config.paper_fee.clone(),
            );
            info!("✓ Paper client created for {}", exchange);
            registry.register(exchange.clone(), Arc::new(client));
        }

        if registry.is_empty() {
            warn!("Market catalog lists no exchanges, no exchange clients created");
        }

        info!(
            "ExchangeClientFactory created {} exchange clients",
            registry.len()
        );

        registry
    }
}

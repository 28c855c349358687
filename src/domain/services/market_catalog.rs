//! Market reference data: which trading pairs each exchange lists.
//!
//! Used to turn a hop (`from -> to`) into an order: when the exchange lists
//! `from-to` the order sells `from`, when it lists `to-from` the order buys
//! `to`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::hop::Hop;
use crate::domain::entities::order::{CurrencyPair, OrderSide};
use crate::domain::value_objects::amount::Amount;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read market catalog {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse market catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A listed pair, with an optional reference price of `base` in `quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub base: String,
    pub quote: String,
    #[serde(default)]
    pub price: Option<Amount>,
}

impl Market {
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.base.clone(), self.quote.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketCatalog {
    markets: HashMap<Exchange, Vec<Market>>,
}

impl MarketCatalog {
    pub fn new(markets: HashMap<Exchange, Vec<Market>>) -> Self {
        Self { markets }
    }

    /// Parse `{"exchange": [{"base": "BTC", "quote": "USD", "price": "65000"}]}`.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let markets: HashMap<Exchange, Vec<Market>> = serde_json::from_str(json)?;
        Ok(Self::new(markets))
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Built-in catalog used when no file is configured.
    pub fn default_catalog() -> Self {
        let listing = |base: &str, quote: &str, price: &str| Market {
            base: base.to_string(),
            quote: quote.to_string(),
            price: Amount::parse(price).ok(),
        };

        let mut markets = HashMap::new();
        for exchange in ["gdax", "gemini", "kraken"] {
            markets.insert(
                Exchange::new(exchange),
                vec![
                    listing("BTC", "USD", "65000"),
                    listing("ETH", "USD", "3200"),
                    listing("ETH", "BTC", "0.049"),
                    listing("LTC", "USD", "85"),
                    listing("LTC", "BTC", "0.0013"),
                ],
            );
        }
        Self::new(markets)
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.markets.keys()
    }

    pub fn markets(&self, exchange: &Exchange) -> &[Market] {
        self.markets
            .get(exchange)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every currency appearing in a pair listed by `exchange`.
    pub fn currencies(&self, exchange: &Exchange) -> BTreeSet<String> {
        self.markets(exchange)
            .iter()
            .flat_map(|m| [m.base.clone(), m.quote.clone()])
            .collect()
    }

    /// Pair and side for a hop, or `None` when the exchange lists neither
    /// orientation.
    pub fn resolve(&self, hop: &Hop) -> Option<(CurrencyPair, OrderSide)> {
        let markets = self.markets(&hop.exchange);
        if markets
            .iter()
            .any(|m| m.base == hop.from_currency && m.quote == hop.to_currency)
        {
            return Some((
                CurrencyPair::new(hop.from_currency.clone(), hop.to_currency.clone()),
                OrderSide::Sell,
            ));
        }
        if markets
            .iter()
            .any(|m| m.base == hop.to_currency && m.quote == hop.from_currency)
        {
            return Some((
                CurrencyPair::new(hop.to_currency.clone(), hop.from_currency.clone()),
                OrderSide::Buy,
            ));
        }
        None
    }

    pub fn reference_price(&self, exchange: &Exchange, pair: &CurrencyPair) -> Option<&Amount> {
        self.markets(exchange)
            .iter()
            .find(|m| m.base == pair.base && m.quote == pair.quote)
            .and_then(|m| m.price.as_ref())
    }
}

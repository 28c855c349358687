use serde::{Deserialize, Serialize};

use crate::domain::entities::exchange::Exchange;
use crate::domain::errors::ValidationError;

/// One currency conversion on one exchange.
///
/// Serialized as the `[exchange, from, to]` triple used by the wire protocol
/// and the stored loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Exchange, String, String)", into = "(Exchange, String, String)")]
pub struct Hop {
    pub exchange: Exchange,
    pub from_currency: String,
    pub to_currency: String,
}

impl Hop {
    pub fn new(
        exchange: impl Into<Exchange>,
        from_currency: impl Into<String>,
        to_currency: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            from_currency: from_currency.into(),
            to_currency: to_currency.into(),
        }
    }

    /// Check structural validity; `index` is the hop position used in errors.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if self.exchange.is_empty() {
            return Err(ValidationError::EmptyExchange { index });
        }
        if self.from_currency.trim().is_empty() || self.to_currency.trim().is_empty() {
            return Err(ValidationError::EmptyCurrency { index });
        }
        if self.from_currency == self.to_currency {
            return Err(ValidationError::SameCurrency {
                index,
                currency: self.from_currency.clone(),
            });
        }
        Ok(())
    }
}

impl From<(Exchange, String, String)> for Hop {
    fn from((exchange, from_currency, to_currency): (Exchange, String, String)) -> Self {
        Self {
            exchange,
            from_currency,
            to_currency,
        }
    }
}

impl From<Hop> for (Exchange, String, String) {
    fn from(hop: Hop) -> Self {
        (hop.exchange, hop.from_currency, hop.to_currency)
    }
}

impl std::fmt::Display for Hop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.exchange, self.from_currency, self.to_currency
        )
    }
}

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::repositories::audit_store::DEFAULT_TOKEN_MAX_ATTEMPTS;
use crate::domain::value_objects::amount::Amount;

/// How much of an adapter's raw payload leaves the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DebugLevel {
    None,
    /// Raw payload recorded in the audit trail only
    #[default]
    Internal,
    /// Raw payload also relayed to the client
    Client,
}

impl DebugLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "none" => Some(DebugLevel::None),
            "internal" => Some(DebugLevel::Internal),
            "client" => Some(DebugLevel::Client),
            _ => None,
        }
    }

    pub fn records_raw(&self) -> bool {
        *self >= DebugLevel::Internal
    }

    pub fn relays_raw(&self) -> bool {
        *self == DebugLevel::Client
    }
}

/// Retry and polling bounds of the order state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Place attempts per hop before giving up
    pub order_count: u32,
    pub status_interval: Duration,
    /// Polls per place attempt before the order is cancelled
    pub status_loop_count: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            order_count: 5,
            status_interval: Duration::from_secs(5),
            status_loop_count: 5,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct PankowConfig {
    pub bind_addr: String,
    pub retry: RetryPolicy,
    pub token_max_attempts: u32,
    pub worker_concurrency: usize,
    pub debug_level: DebugLevel,
    pub markets_path: Option<PathBuf>,
    pub requests_per_minute: u32,
    pub paper_balance: Amount,
    pub paper_fee: Amount,
}

impl Default for PankowConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9999".to_string(),
            retry: RetryPolicy::default(),
            token_max_attempts: DEFAULT_TOKEN_MAX_ATTEMPTS,
            worker_concurrency: 8,
            debug_level: DebugLevel::default(),
            markets_path: None,
            requests_per_minute: 100,
            paper_balance: Amount::from_units(10_000, 0),
            paper_fee: Amount::from_units(1, 3),
        }
    }
}

impl PankowConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PankowConfig {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> PankowConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PankowConfig::default();

        if let Some(addr) = lookup("PANKOW_BIND_ADDR") {
            if addr.trim().is_empty() {
                tracing::warn!(
                    "Empty PANKOW_BIND_ADDR, using default: {}",
                    config.bind_addr
                );
            } else {
                config.bind_addr = addr;
            }
        }

        if let Some(count) = lookup("PANKOW_ORDER_COUNT") {
            match count.parse::<u32>() {
                Ok(value) if (1..=100).contains(&value) => config.retry.order_count = value,
                _ => tracing::warn!(
                    "Invalid PANKOW_ORDER_COUNT '{}' (must be between 1 and 100), using default: {}",
                    count,
                    config.retry.order_count
                ),
            }
        }

        if let Some(interval) = lookup("PANKOW_STATUS_INTERVAL_SECONDS") {
            match interval.parse::<u64>() {
                Ok(value) if value <= 3600 => {
                    config.retry.status_interval = Duration::from_secs(value)
                }
                _ => tracing::warn!(
                    "Invalid PANKOW_STATUS_INTERVAL_SECONDS '{}' (must be at most 3600), using default: {:?}",
                    interval,
                    config.retry.status_interval
                ),
            }
        }

        if let Some(count) = lookup("PANKOW_STATUS_LOOP_COUNT") {
            match count.parse::<u32>() {
                Ok(value) if (1..=100).contains(&value) => {
                    config.retry.status_loop_count = value
                }
                _ => tracing::warn!(
                    "Invalid PANKOW_STATUS_LOOP_COUNT '{}' (must be between 1 and 100), using default: {}",
                    count,
                    config.retry.status_loop_count
                ),
            }
        }

        if let Some(attempts) = lookup("PANKOW_TOKEN_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(value) if value >= 1 => config.token_max_attempts = value,
                _ => tracing::warn!(
                    "Invalid PANKOW_TOKEN_MAX_ATTEMPTS '{}', using default: {}",
                    attempts,
                    config.token_max_attempts
                ),
            }
        }

        if let Some(concurrency) = lookup("PANKOW_WORKER_CONCURRENCY") {
            match concurrency.parse::<usize>() {
                Ok(value) if (1..=1024).contains(&value) => config.worker_concurrency = value,
                _ => tracing::warn!(
                    "Invalid PANKOW_WORKER_CONCURRENCY '{}' (must be between 1 and 1024), using default: {}",
                    concurrency,
                    config.worker_concurrency
                ),
            }
        }

        if let Some(level) = lookup("PANKOW_DEBUG_LEVEL") {
            match DebugLevel::parse(&level) {
                Some(value) => config.debug_level = value,
                None => tracing::warn!(
                    "Invalid PANKOW_DEBUG_LEVEL '{}' (expected none, internal or client), using default: {:?}",
                    level,
                    config.debug_level
                ),
            }
        }

        if let Some(path) = lookup("PANKOW_MARKETS_PATH") {
            if !path.trim().is_empty() {
                config.markets_path = Some(PathBuf::from(path));
            }
        }

        if let Some(rpm) = lookup("PANKOW_REQUESTS_PER_MINUTE") {
            match rpm.parse::<u32>() {
                Ok(value) if value > 0 => config.requests_per_minute = value,
                _ => tracing::warn!(
                    "Invalid PANKOW_REQUESTS_PER_MINUTE '{}', using default: {}",
                    rpm,
                    config.requests_per_minute
                ),
            }
        }

        if let Some(balance) = lookup("PANKOW_PAPER_BALANCE") {
            match Amount::parse(&balance) {
                Ok(value) => config.paper_balance = value,
                Err(e) => tracing::warn!(
                    "Failed to parse PANKOW_PAPER_BALANCE '{}': {}, using default: {}",
                    balance,
                    e,
                    config.paper_balance
                ),
            }
        }

        if let Some(fee) = lookup("PANKOW_PAPER_FEE") {
            match Amount::parse(&fee) {
                Ok(value) if value < Amount::from_units(1, 0) => {
                    config.paper_fee = value
                }
                _ => tracing::warn!(
                    "Invalid PANKOW_PAPER_FEE '{}' (must be in [0, 1)), using default: {}",
                    fee,
                    config.paper_fee
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> PankowConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PankowConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = PankowConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:9999");
        assert_eq!(config.retry.order_count, 5);
        assert_eq!(config.retry.status_loop_count, 5);
        assert_eq!(config.retry.status_interval, Duration::from_secs(5));
        assert_eq!(config.token_max_attempts, 32);
        assert_eq!(config.debug_level, DebugLevel::Internal);
        assert_eq!(config.paper_fee, Amount::parse("0.001").unwrap());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PANKOW_ORDER_COUNT", "3"),
            ("PANKOW_STATUS_INTERVAL_SECONDS", "0"),
            ("PANKOW_DEBUG_LEVEL", "client"),
            ("PANKOW_MARKETS_PATH", "/etc/pankow/markets.json"),
        ]);
        assert_eq!(config.retry.order_count, 3);
        assert_eq!(config.retry.status_interval, Duration::ZERO);
        assert_eq!(config.debug_level, DebugLevel::Client);
        assert_eq!(
            config.markets_path,
            Some(PathBuf::from("/etc/pankow/markets.json"))
        );
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = load(&[
            ("PANKOW_ORDER_COUNT", "0"),
            ("PANKOW_WORKER_CONCURRENCY", "many"),
            ("PANKOW_DEBUG_LEVEL", "verbose"),
            ("PANKOW_PAPER_FEE", "1.5"),
        ]);
        assert_eq!(config.retry.order_count, 5);
        assert_eq!(config.worker_concurrency, 8);
        assert_eq!(config.debug_level, DebugLevel::Internal);
        assert_eq!(config.paper_fee, Amount::parse("0.001").unwrap());
    }

    #[test]
    fn test_debug_level_ordering() {
        assert!(!DebugLevel::None.records_raw());
        assert!(DebugLevel::Internal.records_raw());
        assert!(!DebugLevel::Internal.relays_raw());
        assert!(DebugLevel::Client.relays_raw());
    }
}

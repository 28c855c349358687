pub mod balance_checker;
pub mod market_catalog;
pub mod order_executor;
pub mod progress;
pub mod trade_plan_compiler;

#[cfg(test)]
pub mod scripted_exchange;

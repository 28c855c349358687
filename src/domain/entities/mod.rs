pub mod action_log;
pub mod exchange;
pub mod hop;
pub mod order;
pub mod trade_plan;

pub mod execution_coordinator;
pub mod trade_session;

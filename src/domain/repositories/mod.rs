pub mod audit_store;
pub mod exchange_client;

pub mod exchange_client_factory;
pub mod paper_exchange;

//! Pankow Trade Loop Server Library
//!
//! Compiles multi-exchange trade loops into sub-loops, runs them through an
//! order state machine against exchange adapters and streams every step to
//! the client while recording it in the audit store.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod shutdown;
pub mod task_runner;

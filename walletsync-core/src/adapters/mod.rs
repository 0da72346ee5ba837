//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the local store and the SyncStateStore port
//! - Monobank HTTP client for the BankApi port
//! - Environment / in-memory token sources for SecretProvider
//! - System and manual clocks for Clock

pub mod clock;
pub mod duckdb;
pub mod monobank;
pub mod secrets;

#[cfg(test)]
pub mod monobank_mock;

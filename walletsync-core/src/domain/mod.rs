//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod currency;
mod exchange_rate;
pub mod result;
pub mod rule;
mod sync;
mod transaction;
mod wallet;

pub use exchange_rate::{effective_rate, ExchangeRate, NewExchangeRate};
pub use rule::{AmountPattern, CategoryRule, NewCategoryRule, RuleKind, RuleMatcher};
pub use sync::{SyncSnapshot, SyncStatus, SyncTask, SyncTaskKind};
pub use transaction::{Transaction, TransactionEdit};
pub use wallet::Wallet;

//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod bank_api;
mod clock;
mod event_sink;
mod secrets;
mod sync_state;

pub use bank_api::{
    BankApi, ClientInfo, CurrencyRateItem, RemoteAccount, StatementItem, MAX_STATEMENT_SPAN_SECS,
};
pub use clock::Clock;
pub use event_sink::{EventSink, NoopEventSink, SyncEvent};
pub use secrets::SecretProvider;
pub use sync_state::SyncStateStore;

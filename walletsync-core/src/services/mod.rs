//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod categorization;
mod coordinator;
mod currency;
mod executor;
mod ledger;
pub mod logging;
pub mod migration;

pub use categorization::{categorize, CategorizationService};
pub use coordinator::SyncCoordinator;
pub use currency::CurrencyRateService;
pub use executor::{AccountSyncExecutor, INTEGRATION, RATE_SOURCE};
pub use ledger::{LedgerService, LedgerSummary};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};

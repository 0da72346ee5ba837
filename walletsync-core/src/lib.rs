//! WalletSync Core - bank sync, currency and categorization logic
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Wallet, Transaction, CategoryRule, etc.)
//! - **ports**: Trait definitions for external dependencies (BankApi, Clock, SecretProvider)
//! - **services**: Business logic orchestration (sync coordinator, executor, rates, rules)
//! - **adapters**: Concrete implementations (DuckDB, Monobank HTTP client, clocks)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use adapters::clock::SystemClock;
use adapters::duckdb::DuckDbRepository;
use adapters::monobank::MonobankClient;
use config::Config;
use ports::{BankApi, Clock, EventSink, SecretProvider, SyncStateStore};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    CategoryRule, ExchangeRate, NewCategoryRule, RuleKind, SyncSnapshot, SyncStatus, Transaction,
    Wallet,
};

/// Store file inside the data directory
pub const DATABASE_FILE: &str = "walletsync.duckdb";

/// Main context for WalletSync operations
///
/// This is the primary entry point for all business logic. It holds the
/// database connection, configuration, and all services, wired once.
pub struct WalletSyncContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub secrets: Arc<dyn SecretProvider>,
    pub logging: Arc<LoggingService>,
    pub rates: Arc<CurrencyRateService>,
    pub categorization: Arc<CategorizationService>,
    pub ledger: LedgerService,
    pub executor: Arc<AccountSyncExecutor>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl WalletSyncContext {
    /// Create a context talking to the configured banking API over HTTP
    pub fn new(
        data_dir: &Path,
        entry_point: EntryPoint,
        secrets: Arc<dyn SecretProvider>,
    ) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let api = MonobankClient::with_options(
            &config.sync.base_url,
            config.sync.connect_timeout(),
            config.sync.read_timeout(),
        )?;
        Self::with_components(data_dir, config, entry_point, Arc::new(api), secrets, Arc::new(SystemClock))
    }

    /// Create a context from explicit collaborators
    pub fn with_components(
        data_dir: &Path,
        config: Config,
        entry_point: EntryPoint,
        api: Arc<dyn BankApi>,
        secrets: Arc<dyn SecretProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DATABASE_FILE))?);
        repository.ensure_schema()?;

        let logging = Arc::new(LoggingService::new(
            data_dir,
            entry_point,
            env!("CARGO_PKG_VERSION"),
        )?);
        let events: Arc<dyn EventSink> = logging.clone();

        let rates = Arc::new(CurrencyRateService::new(
            Arc::clone(&repository),
            Arc::clone(&clock),
            config.rates.clone(),
        ));
        let categorization = Arc::new(CategorizationService::new(Arc::clone(&repository)));
        let ledger = LedgerService::new(Arc::clone(&repository), Arc::clone(&categorization));
        let executor = Arc::new(AccountSyncExecutor::new(
            Arc::clone(&repository),
            api,
            Arc::clone(&categorization),
            Arc::clone(&rates),
            Arc::clone(&clock),
            Arc::clone(&events),
        ));
        let state_store: Arc<dyn SyncStateStore> = repository.clone();
        let coordinator = SyncCoordinator::new(
            Arc::clone(&executor),
            Arc::clone(&secrets),
            state_store,
            clock,
            events,
            config.sync.clone(),
        );

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            repository,
            secrets,
            logging,
            rates,
            categorization,
            ledger,
            executor,
            coordinator,
        })
    }
}

//! Sync coordinator scenarios against a scripted banking API
//!
//! Time is a `ManualClock`, so rate-limit countdowns finish instantly while
//! the recorded call times still show the spacing the coordinator enforced.
//!
//! Run with: cargo test --test sync_coordinator_test -- --nocapture

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;
use tokio::sync::broadcast;

use walletsync_core::adapters::clock::ManualClock;
use walletsync_core::adapters::secrets::StaticSecretProvider;
use walletsync_core::config::Config;
use walletsync_core::domain::result::Result;
use walletsync_core::ports::{
    BankApi, ClientInfo, Clock, CurrencyRateItem, RemoteAccount, StatementItem, SyncStateStore,
};
use walletsync_core::services::EntryPoint;
use walletsync_core::{Error, NewCategoryRule, RuleKind, SyncStatus, WalletSyncContext};

const START: i64 = 1_700_000_000;

#[derive(Debug, Clone, Copy)]
enum Failure {
    Transport,
    Unauthorized,
    RateLimited,
}

impl Failure {
    fn to_error(self) -> Error {
        match self {
            Failure::Transport => Error::transport("connection reset"),
            Failure::Unauthorized => Error::Unauthorized("token expired".to_string()),
            Failure::RateLimited => Error::RateLimited("too many requests".to_string()),
        }
    }
}

/// Banking API that serves canned data and records when each call arrived
struct ScriptedApi {
    clock: Arc<ManualClock>,
    accounts: Vec<RemoteAccount>,
    statements: Mutex<HashMap<String, Vec<StatementItem>>>,
    statement_failures: Mutex<HashMap<String, Failure>>,
    client_info_failure: Option<Failure>,
    rates: Vec<CurrencyRateItem>,
    calls: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl ScriptedApi {
    fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            accounts: Vec::new(),
            statements: Mutex::new(HashMap::new()),
            statement_failures: Mutex::new(HashMap::new()),
            client_info_failure: None,
            rates: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_account(mut self, id: &str, currency_code: u16, items: Vec<StatementItem>) -> Self {
        self.accounts.push(RemoteAccount {
            id: id.to_string(),
            balance: 100_000,
            credit_limit: 0,
            currency_code,
            account_type: "black".to_string(),
            cashback_type: None,
            masked_pan: vec![],
            iban: None,
        });
        self.set_statement(id, items);
        self
    }

    fn failing_statement(self, id: &str, failure: Failure) -> Self {
        self.fail_statement(id, failure);
        self
    }

    fn set_statement(&self, id: &str, items: Vec<StatementItem>) {
        self.statements.lock().unwrap().insert(id.to_string(), items);
    }

    fn fail_statement(&self, id: &str, failure: Failure) {
        self.statement_failures
            .lock()
            .unwrap()
            .insert(id.to_string(), failure);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push((call, self.clock.now()));
    }

    fn calls(&self) -> Vec<(String, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }

    fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }

    /// Times of the rate-limited calls, in order
    fn limited_call_times(&self) -> Vec<DateTime<Utc>> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name != "currency_rates")
            .map(|(_, at)| at)
            .collect()
    }
}

#[async_trait]
impl BankApi for ScriptedApi {
    async fn client_info(&self, _token: &str) -> Result<ClientInfo> {
        self.record("client_info".to_string());
        if let Some(failure) = self.client_info_failure {
            return Err(failure.to_error());
        }
        Ok(ClientInfo {
            client_id: Some("client".to_string()),
            name: "Test Client".to_string(),
            accounts: self.accounts.clone(),
        })
    }

    async fn statement(&self, _token: &str, account_id: &str, _from: i64, _to: i64) -> Result<Vec<StatementItem>> {
        self.record(format!("statement:{}", account_id));
        if let Some(failure) = self.statement_failures.lock().unwrap().get(account_id) {
            return Err(failure.to_error());
        }
        Ok(self
            .statements
            .lock()
            .unwrap()
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn currency_rates(&self) -> Result<Vec<CurrencyRateItem>> {
        self.record("currency_rates".to_string());
        Ok(self.rates.clone())
    }
}

fn item(id: &str, amount: i64, mcc: u16) -> StatementItem {
    StatementItem {
        id: id.to_string(),
        time: START - 3600,
        description: format!("Purchase {}", id),
        mcc: Some(mcc),
        hold: false,
        amount,
        operation_amount: amount,
        currency_code: 980,
        commission_rate: 0,
        cashback_amount: 0,
        balance: 100_000,
        comment: None,
    }
}

fn items(prefix: &str, count: usize) -> Vec<StatementItem> {
    (1..=count)
        .map(|i| item(&format!("{}_{}", prefix, i), -(i as i64) * 1000, 5411))
        .collect()
}

struct Harness {
    ctx: WalletSyncContext,
    clock: Arc<ManualClock>,
    api: Arc<ScriptedApi>,
    _dir: TempDir,
}

fn config(rate_limit_seconds: u64) -> Config {
    let mut config = Config::default();
    config.sync.rate_limit_seconds = rate_limit_seconds;
    config.sync.refresh_rates_on_sync = false;
    config
}

fn start_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.timestamp_opt(START, 0).unwrap()))
}

fn harness_in(
    dir: TempDir,
    clock: Arc<ManualClock>,
    api: Arc<ScriptedApi>,
    config: Config,
    token: Option<&str>,
) -> Harness {
    let ctx = WalletSyncContext::with_components(
        dir.path(),
        config,
        EntryPoint::Host,
        api.clone(),
        Arc::new(StaticSecretProvider::new(token)),
        clock.clone(),
    )
    .unwrap();
    Harness {
        ctx,
        clock,
        api,
        _dir: dir,
    }
}

fn harness(build: impl FnOnce(ScriptedApi) -> ScriptedApi, config: Config) -> Harness {
    let clock = start_clock();
    let api = Arc::new(build(ScriptedApi::new(clock.clone())));
    harness_in(TempDir::new().unwrap(), clock, api, config, Some("valid_token"))
}

fn drain(rx: &mut broadcast::Receiver<SyncStatus>) -> Vec<SyncStatus> {
    let mut statuses = Vec::new();
    while let Ok(status) = rx.try_recv() {
        statuses.push(status);
    }
    statuses
}

async fn run_full_sync(h: &Harness) -> SyncStatus {
    h.ctx.coordinator.enqueue_full_sync();
    h.ctx.coordinator.wait_until_idle().await;
    h.ctx.coordinator.status()
}

async fn run_refresh_sync(h: &Harness) -> SyncStatus {
    h.ctx.coordinator.enqueue_full_sync_with_account_refresh();
    h.ctx.coordinator.wait_until_idle().await;
    h.ctx.coordinator.status()
}

#[tokio::test]
async fn test_first_sync_discovers_accounts_then_fetches_statements() {
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 3))
                .with_account("acc_b", 840, items("b", 2))
        },
        config(5),
    );

    let status = run_full_sync(&h).await;
    assert_eq!(
        status,
        SyncStatus::Completed {
            accounts: 2,
            transactions: 5
        }
    );
    assert_eq!(
        h.api.call_names(),
        vec!["client_info", "statement:acc_a", "statement:acc_b"]
    );

    let wallets = h.ctx.ledger.list_wallets(true).unwrap();
    assert_eq!(wallets.len(), 2);
    assert_eq!(h.ctx.ledger.summary().unwrap().transactions, 5);
    assert_eq!(
        h.ctx.repository.cached_account_ids().unwrap(),
        vec!["acc_a".to_string(), "acc_b".to_string()]
    );
    assert!(!h.ctx.coordinator.is_processing());
    assert_eq!(h.ctx.coordinator.queue_depth(), 0);
}

#[tokio::test]
async fn test_cached_accounts_sync_waits_before_each_statement() {
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 2))
                .with_account("acc_b", 980, items("b", 1))
        },
        config(60),
    );

    // Seed wallets and the cached id list, as a previous run would have.
    run_refresh_sync(&h).await;
    h.ctx.repository.set_last_remote_call_at(h.clock.now()).unwrap();
    let calls_before = h.api.calls().len();

    let mut rx = h.ctx.coordinator.subscribe();
    let started_at = h.clock.now();
    let status = run_full_sync(&h).await;

    assert_eq!(
        status,
        SyncStatus::Completed {
            accounts: 2,
            transactions: 0
        }
    );

    let calls = h.api.calls();
    let new_calls: Vec<_> = calls[calls_before..].to_vec();
    assert_eq!(new_calls.len(), 2);
    assert_eq!(new_calls[0].0, "statement:acc_a");
    assert_eq!(new_calls[1].0, "statement:acc_b");
    assert!(new_calls[0].1 - started_at >= chrono::Duration::seconds(60));
    assert!(new_calls[1].1 - new_calls[0].1 >= chrono::Duration::seconds(60));

    let statuses = drain(&mut rx);
    assert!(statuses
        .iter()
        .any(|s| matches!(s, SyncStatus::WaitingForRateLimit { seconds_remaining: 60 })));
    assert!(statuses
        .iter()
        .any(|s| matches!(s, SyncStatus::WaitingForRateLimit { seconds_remaining: 1 })));

    assert_eq!(h.ctx.repository.last_success_at().unwrap(), Some(h.clock.now()));
    assert_eq!(h.ctx.coordinator.last_success_at(), Some(h.clock.now()));
}

#[tokio::test]
async fn test_remote_calls_never_closer_than_rate_limit() {
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 1))
                .with_account("acc_b", 980, items("b", 1))
                .with_account("acc_c", 978, items("c", 1))
        },
        config(60),
    );

    run_refresh_sync(&h).await;
    run_full_sync(&h).await;

    let times = h.api.limited_call_times();
    assert_eq!(times.len(), 7);
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= chrono::Duration::seconds(60),
            "calls {} and {} are too close",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test]
async fn test_repeated_sync_is_idempotent() {
    let h = harness(
        |api| api.with_account("acc_a", 980, items("a", 4)),
        config(1),
    );

    let first = run_full_sync(&h).await;
    assert_eq!(
        first,
        SyncStatus::Completed {
            accounts: 1,
            transactions: 4
        }
    );

    let second = run_full_sync(&h).await;
    assert_eq!(
        second,
        SyncStatus::Completed {
            accounts: 1,
            transactions: 0
        }
    );
    assert_eq!(h.ctx.ledger.summary().unwrap().transactions, 4);
    assert_eq!(h.ctx.ledger.list_wallets(true).unwrap().len(), 1);
}

#[tokio::test]
async fn test_statement_failure_is_isolated() {
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 2))
                .with_account("acc_b", 980, items("b", 3))
        },
        config(1),
    );
    run_refresh_sync(&h).await;
    let before = h.ctx.ledger.summary().unwrap().transactions;
    assert_eq!(before, 5);

    // New items only on B; A starts failing.
    h.api.fail_statement("acc_a", Failure::Transport);
    h.api.set_statement("acc_b", items("b_new", 2));

    let status = run_full_sync(&h).await;
    assert_eq!(
        status,
        SyncStatus::Completed {
            accounts: 1,
            transactions: 2
        }
    );
    assert_eq!(h.ctx.ledger.summary().unwrap().transactions, 7);
    assert!(h.api.call_names().contains(&"statement:acc_b".to_string()));

    let errors = h.ctx.logging.get_errors(10).unwrap();
    assert!(errors.iter().any(|e| e.event == "statement_sync_failed"));
    // Only the error class is recorded, never account identifiers.
    assert!(errors
        .iter()
        .all(|e| !e.error_message.as_deref().unwrap_or("").contains("acc_a")));
}

#[tokio::test]
async fn test_discovered_account_counts_only_after_its_statement_syncs() {
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 2))
                .with_account("acc_b", 980, items("b", 3))
                .failing_statement("acc_a", Failure::Transport)
        },
        config(1),
    );

    let status = run_refresh_sync(&h).await;
    assert_eq!(
        status,
        SyncStatus::Completed {
            accounts: 1,
            transactions: 3
        }
    );
    // Both wallets exist even though only B synced its statement.
    assert_eq!(h.ctx.ledger.list_wallets(true).unwrap().len(), 2);
}

#[tokio::test]
async fn test_run_with_every_statement_failing_keeps_last_status() {
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 1))
                .with_account("acc_b", 980, items("b", 1))
                .failing_statement("acc_a", Failure::Transport)
                .failing_statement("acc_b", Failure::Transport)
        },
        config(1),
    );
    let mut rx = h.ctx.coordinator.subscribe();

    let status = run_full_sync(&h).await;
    assert!(matches!(status, SyncStatus::Syncing { .. }), "got {:?}", status);
    assert!(!h.ctx.coordinator.is_processing());
    assert_eq!(h.ctx.coordinator.queue_depth(), 0);
    assert_eq!(h.ctx.coordinator.last_success_at(), None);
    assert_eq!(h.ctx.repository.last_success_at().unwrap(), None);
    assert!(h.ctx.coordinator.should_sync(Duration::from_secs(3600)));

    let statuses = drain(&mut rx);
    assert!(statuses
        .iter()
        .all(|s| !matches!(s, SyncStatus::Idle | SyncStatus::Completed { .. })));
}

#[tokio::test]
async fn test_account_discovery_failure_aborts_run() {
    let h = harness(
        |mut api| {
            api = api.with_account("acc_a", 980, items("a", 2));
            api.client_info_failure = Some(Failure::Transport);
            api
        },
        config(1),
    );

    let status = run_full_sync(&h).await;
    assert!(matches!(status, SyncStatus::Failed { .. }));
    assert_eq!(h.api.call_names(), vec!["client_info"]);
    assert_eq!(h.ctx.coordinator.queue_depth(), 0);
    assert!(!h.ctx.coordinator.is_processing());
    assert_eq!(h.ctx.repository.last_success_at().unwrap(), None);
    assert!(h.ctx.coordinator.should_sync(Duration::from_secs(3600)));
}

#[tokio::test]
async fn test_unauthorized_statement_aborts_remaining_queue() {
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 1))
                .with_account("acc_b", 980, items("b", 1))
                .failing_statement("acc_a", Failure::Unauthorized)
        },
        config(1),
    );

    let status = run_full_sync(&h).await;
    match status {
        SyncStatus::Failed { reason } => assert!(reason.contains("Authorization")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.api.call_names(), vec!["client_info", "statement:acc_a"]);
    assert_eq!(h.ctx.coordinator.queue_depth(), 0);
}

#[tokio::test]
async fn test_remote_rate_limit_pushes_next_call_back() {
    let mut cfg = config(10);
    cfg.sync.remote_backoff_seconds = 120;
    let h = harness(
        |api| {
            api.with_account("acc_a", 980, items("a", 1))
                .with_account("acc_b", 980, items("b", 1))
                .failing_statement("acc_a", Failure::RateLimited)
        },
        cfg,
    );

    let status = run_full_sync(&h).await;
    assert_eq!(
        status,
        SyncStatus::Completed {
            accounts: 1,
            transactions: 1
        }
    );

    let calls = h.api.calls();
    let a = calls.iter().find(|(n, _)| n == "statement:acc_a").unwrap().1;
    let b = calls.iter().find(|(n, _)| n == "statement:acc_b").unwrap().1;
    assert!(b - a >= chrono::Duration::seconds(120));
}

#[tokio::test]
async fn test_remote_rate_limit_on_discovery_delays_next_run() {
    let mut cfg = config(10);
    cfg.sync.remote_backoff_seconds = 120;
    let h = harness(
        |mut api| {
            api = api.with_account("acc_a", 980, items("a", 1));
            api.client_info_failure = Some(Failure::RateLimited);
            api
        },
        cfg,
    );

    let status = run_full_sync(&h).await;
    assert!(matches!(status, SyncStatus::Failed { .. }));
    let first = h.api.limited_call_times()[0];
    assert_eq!(
        h.ctx.repository.backoff_until().unwrap(),
        Some(first + chrono::Duration::seconds(120))
    );

    run_full_sync(&h).await;
    let times = h.api.limited_call_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - first >= chrono::Duration::seconds(120));
}

#[tokio::test]
async fn test_missing_token_fails_without_remote_calls() {
    let clock = start_clock();
    let api = Arc::new(ScriptedApi::new(clock.clone()).with_account("acc_a", 980, items("a", 1)));
    let h = harness_in(TempDir::new().unwrap(), clock, api, config(1), None);

    h.ctx.coordinator.enqueue_full_sync();
    assert_eq!(
        h.ctx.coordinator.status(),
        SyncStatus::Failed {
            reason: "No API token configured".to_string()
        }
    );
    assert!(!h.ctx.coordinator.is_processing());
    h.ctx.coordinator.wait_until_idle().await;
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_during_countdown_returns_to_idle() {
    let h = harness(
        |api| api.with_account("acc_a", 980, items("a", 1)),
        config(60),
    );
    run_refresh_sync(&h).await;
    let calls_before = h.api.calls().len();

    h.ctx.coordinator.enqueue_full_sync();
    assert!(h.ctx.coordinator.is_processing());
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert!(matches!(
        h.ctx.coordinator.status(),
        SyncStatus::WaitingForRateLimit { .. } | SyncStatus::Syncing { .. }
    ));

    h.ctx.coordinator.cancel_sync();
    assert_eq!(h.ctx.coordinator.status(), SyncStatus::Idle);
    assert_eq!(h.ctx.coordinator.queue_depth(), 0);
    assert!(!h.ctx.coordinator.is_processing());

    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.ctx.coordinator.status(), SyncStatus::Idle);
    assert_eq!(h.api.calls().len(), calls_before);
}

#[tokio::test]
async fn test_should_sync_follows_last_success() {
    let h = harness(|api| api.with_account("acc_a", 980, items("a", 1)), config(1));
    let hour = Duration::from_secs(3600);

    assert!(h.ctx.coordinator.should_sync(hour));
    run_full_sync(&h).await;
    assert!(!h.ctx.coordinator.should_sync(hour));

    h.clock.advance(Duration::from_secs(3600));
    assert!(h.ctx.coordinator.should_sync(hour));
}

#[tokio::test]
async fn test_synced_transactions_are_categorized_by_rules() {
    let h = harness(
        |api| {
            api.with_account(
                "acc_a",
                980,
                vec![item("groceries", -25_000, 5411), item("taxi", -15_000, 4121)],
            )
        },
        config(1),
    );
    h.ctx
        .categorization
        .add_rule(NewCategoryRule {
            kind: RuleKind::MerchantCode,
            pattern: "5411".to_string(),
            category: "Groceries".to_string(),
            subcategory: None,
            priority: 1,
        })
        .unwrap();

    run_full_sync(&h).await;

    let txs = h.ctx.ledger.list_transactions(None, None).unwrap();
    let groceries = txs.iter().find(|t| t.external_id.as_deref() == Some("groceries")).unwrap();
    let taxi = txs.iter().find(|t| t.external_id.as_deref() == Some("taxi")).unwrap();
    assert_eq!(groceries.category.as_deref(), Some("Groceries"));
    assert_eq!(groceries.amount, dec!(-250));
    assert!(groceries.rule_id.is_some());
    assert_eq!(taxi.category, None);
}

#[tokio::test]
async fn test_rate_limiter_survives_restart() {
    let h = harness(|api| api.with_account("acc_a", 980, items("a", 1)), config(60));
    run_full_sync(&h).await;
    let last_call = *h.api.limited_call_times().last().unwrap();

    let Harness { ctx, clock, api, _dir: dir } = h;
    drop(ctx);
    api.calls.lock().unwrap().clear();
    let h = harness_in(dir, clock, api, config(60), Some("valid_token"));

    run_full_sync(&h).await;
    let first_call = h.api.limited_call_times()[0];
    assert!(first_call - last_call >= chrono::Duration::seconds(60));
}

#[tokio::test]
async fn test_currency_rates_ingested_at_run_start() {
    let mut cfg = config(1);
    cfg.sync.refresh_rates_on_sync = true;
    let h = harness(
        |mut api| {
            api.rates = vec![
                CurrencyRateItem {
                    currency_code_a: 840,
                    currency_code_b: 980,
                    date: START,
                    rate_buy: Some(dec!(41.0)),
                    rate_sell: Some(dec!(42.0)),
                    rate_cross: None,
                },
                CurrencyRateItem {
                    currency_code_a: 978,
                    currency_code_b: 980,
                    date: START,
                    rate_buy: None,
                    rate_sell: None,
                    rate_cross: Some(dec!(45.5)),
                },
            ];
            api.with_account("acc_a", 980, items("a", 1))
        },
        cfg,
    );

    run_full_sync(&h).await;

    assert_eq!(h.api.call_names()[0], "currency_rates");
    assert_eq!(h.ctx.rates.get_rate("USD", "UAH").unwrap(), Some(dec!(41.5)));
    assert_eq!(
        h.ctx.rates.get_rate("USD", "EUR").unwrap(),
        Some(dec!(41.5) * (rust_decimal::Decimal::ONE / dec!(45.5)))
    );
}

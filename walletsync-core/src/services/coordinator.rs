//! Sync coordinator - one queue, one worker, one rate limit
//!
//! All rate-limited remote calls go through a single FIFO queue drained by
//! one background worker. Consecutive dispatches are at least
//! `rateLimitSeconds` apart; while waiting the worker publishes a countdown
//! once per second.
//!
//! Failure policy: a failed account discovery aborts the run and drains the
//! queue, since no statement task is meaningful without it. A failed
//! statement task is logged and the run moves on to the next account. An
//! authorization failure aborts the run wherever it happens.
//!
//! Observers subscribe to a broadcast stream of every status change or to a
//! `watch` channel carrying the latest [`SyncSnapshot`].

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::SyncSettings;
use crate::domain::result::Error;
use crate::domain::{SyncSnapshot, SyncStatus, SyncTask, SyncTaskKind};
use crate::ports::{Clock, EventSink, SecretProvider, SyncEvent, SyncStateStore};
use crate::services::executor::{AccountSyncExecutor, INTEGRATION};

/// Buffered status updates per subscriber before it starts lagging
const STATUS_CHANNEL_CAPACITY: usize = 256;

const TICK: Duration = Duration::from_secs(1);

/// Mutable coordinator state, guarded by one mutex
struct RunState {
    queue: VecDeque<SyncTask>,
    status: SyncStatus,
    is_processing: bool,
    synced_accounts: HashSet<String>,
    transactions_synced: usize,
    last_remote_call: Option<DateTime<Utc>>,
    /// Set after the remote service answered 429
    backoff_until: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    /// Bumped on every new run and on cancel; stale workers stop when it moves
    generation: u64,
    worker: Option<JoinHandle<()>>,
}

enum Step {
    Continue,
    Stop,
}

/// Drives sync runs for the host application
pub struct SyncCoordinator {
    executor: Arc<AccountSyncExecutor>,
    secrets: Arc<dyn SecretProvider>,
    state_store: Arc<dyn SyncStateStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    settings: SyncSettings,
    state: Mutex<RunState>,
    status_tx: broadcast::Sender<SyncStatus>,
    snapshot_tx: watch::Sender<SyncSnapshot>,
}

impl SyncCoordinator {
    pub fn new(
        executor: Arc<AccountSyncExecutor>,
        secrets: Arc<dyn SecretProvider>,
        state_store: Arc<dyn SyncStateStore>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        let last_success_at = state_store.last_success_at().unwrap_or_else(|e| {
            warn!("Could not read last sync time: {}", e);
            None
        });
        let last_remote_call = state_store.last_remote_call_at().unwrap_or_else(|e| {
            warn!("Could not read last remote call time: {}", e);
            None
        });
        let backoff_until = state_store.backoff_until().unwrap_or_else(|e| {
            warn!("Could not read remote backoff: {}", e);
            None
        });

        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(SyncSnapshot {
            last_success_at,
            ..SyncSnapshot::default()
        });

        Arc::new(Self {
            executor,
            secrets,
            state_store,
            clock,
            events,
            settings,
            state: Mutex::new(RunState {
                queue: VecDeque::new(),
                status: SyncStatus::Idle,
                is_processing: false,
                synced_accounts: HashSet::new(),
                transactions_synced: 0,
                last_remote_call,
                backoff_until,
                last_success_at,
                generation: 0,
                worker: None,
            }),
            status_tx,
            snapshot_tx,
        })
    }

    // A panic in one observer must not wedge the queue for everyone else.
    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // === Observation ===

    /// Stream of every status change, countdown ticks included
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Latest snapshot, updated on every state change
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        snapshot_of(&self.lock())
    }

    pub fn status(&self) -> SyncStatus {
        self.lock().status.clone()
    }

    pub fn queue_depth(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_processing(&self) -> bool {
        self.lock().is_processing
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_success_at
    }

    /// Resolve once no run is in progress
    pub async fn wait_until_idle(&self) {
        let mut rx = self.watch();
        // The sender lives as long as self, so this only fails if self is gone.
        let _ = rx.wait_for(|snapshot| !snapshot.is_processing).await;
    }

    fn publish(&self, state: &mut RunState, status: SyncStatus) {
        debug!("Sync status: {:?}", status);
        state.status = status.clone();
        // No subscribers is fine.
        let _ = self.status_tx.send(status);
        self.snapshot_tx.send_replace(snapshot_of(state));
    }

    fn refresh_snapshot(&self, state: &RunState) {
        self.snapshot_tx.send_replace(snapshot_of(state));
    }

    // === Commands ===

    /// Start a run, using cached account ids when available
    ///
    /// With cached ids one statement task is queued per account; otherwise a
    /// single account discovery task is queued, which queues the statement
    /// tasks itself.
    pub fn enqueue_full_sync(self: &Arc<Self>) {
        self.start_run(false);
    }

    /// Start a run that always refreshes account metadata first
    pub fn enqueue_full_sync_with_account_refresh(self: &Arc<Self>) {
        self.start_run(true);
    }

    /// True if no successful sync is recorded or `interval` has elapsed since it
    pub fn should_sync(&self, interval: Duration) -> bool {
        let last = self.state_store.last_success_at().unwrap_or_else(|e| {
            warn!("Could not read last sync time: {}", e);
            None
        });
        match last {
            None => true,
            Some(at) => chrono::Duration::from_std(interval)
                .map(|interval| self.clock.now() - at >= interval)
                .unwrap_or(false),
        }
    }

    /// Stop the current run: abort the worker, drain the queue, go idle
    ///
    /// Work already reconciled stays committed.
    pub fn cancel_sync(&self) {
        let mut state = self.lock();
        let was_processing = state.is_processing;
        stop_worker(&mut state);
        state.queue.clear();
        state.is_processing = false;
        self.publish(&mut state, SyncStatus::Idle);
        drop(state);

        if was_processing {
            info!("Sync cancelled");
            self.events
                .emit(SyncEvent::new("sync_cancelled").with_integration(INTEGRATION));
        }
    }

    fn start_run(self: &Arc<Self>, refresh_accounts: bool) {
        let token = match self.secrets.read_token() {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                warn!("Sync requested but no API token is configured");
                let mut state = self.lock();
                self.publish(&mut state, SyncStatus::failed("No API token configured"));
                drop(state);
                self.events.emit(
                    SyncEvent::new("sync_failed")
                        .with_integration(INTEGRATION)
                        .with_error("config"),
                );
                return;
            }
        };

        let cached_ids = if refresh_accounts {
            Vec::new()
        } else {
            self.state_store.cached_account_ids().unwrap_or_else(|e| {
                warn!("Could not read cached account ids, refreshing accounts: {}", e);
                Vec::new()
            })
        };
        let persisted_call = self.state_store.last_remote_call_at().unwrap_or_else(|e| {
            warn!("Could not read last remote call time: {}", e);
            None
        });
        let persisted_backoff = self.state_store.backoff_until().unwrap_or_else(|e| {
            warn!("Could not read remote backoff: {}", e);
            None
        });
        let now = self.clock.now();

        let mut state = self.lock();
        stop_worker(&mut state);
        state.queue.clear();
        state.synced_accounts.clear();
        state.transactions_synced = 0;
        state.last_remote_call = state.last_remote_call.max(persisted_call);
        state.backoff_until = state.backoff_until.max(persisted_backoff);

        if cached_ids.is_empty() {
            state.queue.push_back(SyncTask::account_info(now));
        } else {
            debug!("Using {} cached account ids", cached_ids.len());
            for id in cached_ids {
                state.queue.push_back(SyncTask::statement(id, now));
            }
        }

        state.is_processing = true;
        let generation = state.generation;
        self.publish(&mut state, SyncStatus::syncing("Starting sync"));

        let this = Arc::clone(self);
        state.worker = Some(tokio::spawn(async move {
            this.run_queue(generation, token).await;
        }));
        drop(state);

        info!("Sync started");
        self.events
            .emit(SyncEvent::new("sync_started").with_integration(INTEGRATION));
    }

    // === Worker ===

    async fn run_queue(self: Arc<Self>, generation: u64, token: String) {
        if self.settings.refresh_rates_on_sync {
            // Public endpoint, outside the rate limit; a failure here never fails the run.
            if let Err(e) = self.executor.sync_currency_rates().await {
                warn!("Currency rate refresh failed: {}", e);
            }
        }

        loop {
            let next = {
                let mut state = self.lock();
                if state.generation != generation {
                    return;
                }
                if state.queue.is_empty() {
                    let completed_at = self.finish_run(&mut state);
                    drop(state);
                    if let Some(at) = completed_at {
                        if let Err(e) = self.state_store.set_last_success_at(at) {
                            warn!("Could not persist last sync time: {}", e);
                        }
                        self.events
                            .emit(SyncEvent::new("sync_completed").with_integration(INTEGRATION));
                    }
                    return;
                }
                if self.remaining_wait(&state).is_zero() {
                    let task = state.queue.pop_front();
                    state.last_remote_call = Some(self.clock.now());
                    self.refresh_snapshot(&state);
                    task
                } else {
                    None
                }
            };

            match next {
                Some(task) => {
                    if let Step::Stop = self.run_task(generation, &token, task).await {
                        return;
                    }
                }
                None => {
                    if !self.wait_for_rate_limit(generation).await {
                        return;
                    }
                }
            }
        }
    }

    /// Time left before the next remote call is permitted
    fn remaining_wait(&self, state: &RunState) -> Duration {
        let interval = chrono::Duration::from_std(self.settings.rate_limit())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let next_allowed = state
            .last_remote_call
            .map(|at| at + interval)
            .max(state.backoff_until);

        match next_allowed {
            Some(next) => (next - self.clock.now()).to_std().unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    /// Count down to the next permitted call; false if the run was cancelled
    async fn wait_for_rate_limit(&self, generation: u64) -> bool {
        loop {
            let remaining = {
                let mut state = self.lock();
                if state.generation != generation {
                    return false;
                }
                let remaining = self.remaining_wait(&state);
                if remaining.is_zero() {
                    return true;
                }
                let seconds_remaining = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                self.publish(&mut state, SyncStatus::WaitingForRateLimit { seconds_remaining });
                remaining
            };
            self.clock.sleep(remaining.min(TICK)).await;
        }
    }

    async fn run_task(&self, generation: u64, token: &str, task: SyncTask) -> Step {
        self.persist_remote_call();

        match task.kind {
            SyncTaskKind::FetchAccountInfo => {
                self.set_progress(generation, "Fetching accounts".to_string());
                match self.executor.refresh_accounts(token).await {
                    Ok(wallets) => {
                        let ids: Vec<String> =
                            wallets.iter().filter_map(|w| w.external_id.clone()).collect();
                        if let Err(e) = self.state_store.set_cached_account_ids(&ids) {
                            warn!("Could not cache account ids: {}", e);
                        }

                        let now = self.clock.now();
                        let mut state = self.lock();
                        if state.generation != generation {
                            return Step::Stop;
                        }
                        for id in ids {
                            state.queue.push_back(SyncTask::statement(id, now));
                        }
                        self.refresh_snapshot(&state);
                        Step::Continue
                    }
                    Err(e) => {
                        if e.is_rate_limited() {
                            self.back_off_remote();
                        }
                        self.fail_run(generation, &e);
                        Step::Stop
                    }
                }
            }
            SyncTaskKind::FetchStatement { account_id } => {
                let remaining = self.queue_depth();
                self.set_progress(
                    generation,
                    format!("Syncing transactions ({} accounts left)", remaining),
                );
                let result = self
                    .executor
                    .sync_transactions_for_account(token, &account_id, self.settings.statement_days)
                    .await;

                match result {
                    Ok(created) => {
                        let mut state = self.lock();
                        if state.generation != generation {
                            return Step::Stop;
                        }
                        state.synced_accounts.insert(account_id);
                        state.transactions_synced += created;
                        Step::Continue
                    }
                    Err(e) if e.is_fatal_for_run() => {
                        self.fail_run(generation, &e);
                        Step::Stop
                    }
                    Err(e) => {
                        self.isolate_statement_failure(&e);
                        Step::Continue
                    }
                }
            }
        }
    }

    fn set_progress(&self, generation: u64, progress: String) {
        let mut state = self.lock();
        if state.generation == generation {
            self.publish(&mut state, SyncStatus::syncing(progress));
        }
    }

    fn persist_remote_call(&self) {
        let last = self.lock().last_remote_call;
        if let Some(at) = last {
            if let Err(e) = self.state_store.set_last_remote_call_at(at) {
                warn!("Could not persist last remote call time: {}", e);
            }
        }
    }

    fn isolate_statement_failure(&self, e: &Error) {
        warn!("Statement sync failed, continuing with next account: {}", e);
        self.events.emit(
            SyncEvent::new("statement_sync_failed")
                .with_integration(INTEGRATION)
                .with_error(e.kind()),
        );

        if e.is_rate_limited() {
            self.back_off_remote();
        }
    }

    /// Push the next permitted dispatch out after the remote answered 429
    ///
    /// Applies across runs and restarts: the deadline is persisted.
    fn back_off_remote(&self) {
        let backoff = chrono::Duration::from_std(self.settings.remote_backoff())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let until = self.clock.now() + backoff;
        {
            let mut state = self.lock();
            state.backoff_until = state.backoff_until.max(Some(until));
        }
        if let Err(e) = self.state_store.set_backoff_until(until) {
            warn!("Could not persist remote backoff: {}", e);
        }
        warn!("Remote rate limit hit, backing off until {}", until);
        self.events
            .emit(SyncEvent::new("rate_limited_by_remote").with_integration(INTEGRATION));
    }

    fn fail_run(&self, generation: u64, e: &Error) {
        error!("Sync failed: {}", e);
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }
        state.queue.clear();
        state.is_processing = false;
        self.publish(&mut state, SyncStatus::failed(e.to_string()));
        drop(state);

        self.events.emit(
            SyncEvent::new("sync_failed")
                .with_integration(INTEGRATION)
                .with_error(e.kind()),
        );
    }

    /// Close an emptied run; returns the completion time if anything synced
    fn finish_run(&self, state: &mut RunState) -> Option<DateTime<Utc>> {
        state.is_processing = false;
        let accounts = state.synced_accounts.len();
        let transactions = state.transactions_synced;

        if accounts == 0 && transactions == 0 {
            // Status keeps the last progress value; nothing is marked as success.
            info!("Sync finished without syncing anything");
            self.refresh_snapshot(state);
            return None;
        }

        let now = self.clock.now();
        state.last_success_at = Some(now);
        info!(
            "Sync completed: {} accounts, {} new transactions",
            accounts, transactions
        );
        self.publish(
            state,
            SyncStatus::Completed {
                accounts,
                transactions,
            },
        );
        Some(now)
    }
}

fn snapshot_of(state: &RunState) -> SyncSnapshot {
    SyncSnapshot {
        status: state.status.clone(),
        queue_depth: state.queue.len(),
        is_processing: state.is_processing,
        last_success_at: state.last_success_at,
    }
}

fn stop_worker(state: &mut RunState) {
    state.generation += 1;
    if let Some(worker) = state.worker.take() {
        worker.abort();
    }
}

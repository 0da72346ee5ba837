//! Account sync executor - turns remote payloads into local records
//!
//! Every remote entity is reconciled by its external id, so replaying the
//! same payload never creates duplicates. The executor performs exactly the
//! remote call it is asked for; scheduling and rate limiting belong to the
//! coordinator.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::currency::{alpha_code, to_major_units};
use crate::domain::result::{Error, Result};
use crate::domain::{effective_rate, NewExchangeRate, Transaction, Wallet};
use crate::ports::{
    BankApi, ClientInfo, Clock, EventSink, RemoteAccount, StatementItem, SyncEvent,
    MAX_STATEMENT_SPAN_SECS,
};
use crate::services::{CategorizationService, CurrencyRateService};

/// Source tag for rates ingested from the bank's public table
pub const RATE_SOURCE: &str = "monobank";

/// Integration name attached to emitted events
pub const INTEGRATION: &str = "monobank";

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Executes single sync steps against the remote API and the local store
pub struct AccountSyncExecutor {
    repository: Arc<DuckDbRepository>,
    api: Arc<dyn BankApi>,
    categorization: Arc<CategorizationService>,
    rates: Arc<CurrencyRateService>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl AccountSyncExecutor {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        api: Arc<dyn BankApi>,
        categorization: Arc<CategorizationService>,
        rates: Arc<CurrencyRateService>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            repository,
            api,
            categorization,
            rates,
            clock,
            events,
        }
    }

    /// Ingest the public rate table; returns the number of pairs stored
    ///
    /// Pairs with an unknown currency code or without a positive rate are
    /// skipped and logged; only storage errors abort the ingestion.
    pub async fn sync_currency_rates(&self) -> Result<usize> {
        let items = self.api.currency_rates().await?;
        let mut stored = 0;
        let mut skipped = 0;

        for item in &items {
            let (from, to) = match (alpha_code(item.currency_code_a), alpha_code(item.currency_code_b)) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    debug!(
                        "Skipping rate {}/{}: unknown currency code",
                        item.currency_code_a, item.currency_code_b
                    );
                    skipped += 1;
                    continue;
                }
            };

            let Some(rate) = effective_rate(item.rate_cross, item.rate_buy, item.rate_sell) else {
                warn!("Skipping rate {}/{}: no cross, buy or sell value", from, to);
                skipped += 1;
                continue;
            };
            if rate <= Decimal::ZERO || from == to {
                warn!("Skipping rate {}/{}: unusable value {}", from, to, rate);
                skipped += 1;
                continue;
            }

            self.rates.save_rate(&NewExchangeRate {
                from_currency: from.to_string(),
                to_currency: to.to_string(),
                rate,
                buy: item.rate_buy,
                sell: item.rate_sell,
                source: RATE_SOURCE.to_string(),
            })?;
            stored += 1;
        }

        info!("Stored {} exchange rates ({} skipped)", stored, skipped);
        self.events
            .emit(SyncEvent::new("currency_rates_synced").with_integration(INTEGRATION));
        Ok(stored)
    }

    /// Fetch client info and reconcile its accounts into wallets
    pub async fn refresh_accounts(&self, token: &str) -> Result<Vec<Wallet>> {
        let info = self.api.client_info(token).await?;
        self.sync_accounts_from_client_info(&info)
    }

    /// Reconcile every account of the client into wallets; persists once
    ///
    /// Accounts in an unknown currency are skipped with a warning.
    pub fn sync_accounts_from_client_info(&self, info: &ClientInfo) -> Result<Vec<Wallet>> {
        let mut wallets = Vec::with_capacity(info.accounts.len());
        for account in &info.accounts {
            match self.prepare_wallet(account) {
                Ok(wallet) => wallets.push(wallet),
                Err(e) => warn!("Skipping account: {}", e),
            }
        }
        self.repository.upsert_wallets(&wallets)?;
        info!("Synced {} of {} accounts", wallets.len(), info.accounts.len());
        Ok(wallets)
    }

    /// Reconcile and persist a single account
    pub fn sync_account(&self, account: &RemoteAccount) -> Result<Wallet> {
        let wallet = self.prepare_wallet(account)?;
        self.repository.upsert_wallet(&wallet)?;
        Ok(wallet)
    }

    /// Find or create the wallet for an account and refresh it in memory
    fn prepare_wallet(&self, account: &RemoteAccount) -> Result<Wallet> {
        let currency = alpha_code(account.currency_code).ok_or_else(|| {
            Error::data(format!(
                "unknown currency code {} for account {}",
                account.currency_code, account.id
            ))
        })?;
        let now = self.clock.now();

        let mut wallet = match self.repository.find_wallet_by_external_id(&account.id)? {
            Some(wallet) => wallet,
            None => {
                let mut wallet = Wallet::new(
                    Uuid::new_v4(),
                    Wallet::generated_name(&account.account_type, currency),
                    currency,
                );
                wallet.external_id = Some(account.id.clone());
                wallet.created_at = now;
                debug!("Creating wallet '{}'", wallet.name);
                wallet
            }
        };

        wallet.external_type = Some(account.account_type.clone()).filter(|t| !t.is_empty());
        wallet.masked_pan = Some(account.masked_pan.join(",")).filter(|p| !p.is_empty());
        wallet.iban = account.iban.clone();
        wallet.credit_limit = Some(to_major_units(account.credit_limit, &wallet.currency));
        wallet.cashback_type = account.cashback_type.clone();
        wallet.balance = to_major_units(account.balance, &wallet.currency);
        wallet.last_sync_at = Some(now);
        wallet.updated_at = now;
        Ok(wallet)
    }

    /// Fetch and reconcile the trailing `days_back` days of one account
    ///
    /// Returns the number of newly created transactions. Items reconciled
    /// before an error stay committed.
    pub async fn sync_transactions_for_account(
        &self,
        token: &str,
        account_id: &str,
        days_back: u32,
    ) -> Result<usize> {
        let mut wallet = self
            .repository
            .find_wallet_by_external_id(account_id)?
            .ok_or_else(|| Error::data(format!("no local wallet for account {}", account_id)))?;

        let mut span = i64::from(days_back) * SECONDS_PER_DAY;
        if span > MAX_STATEMENT_SPAN_SECS {
            warn!(
                "Statement window of {} days exceeds the remote maximum, clamping",
                days_back
            );
            span = MAX_STATEMENT_SPAN_SECS;
        }
        let to = self.clock.now().timestamp();
        let from = to - span;

        let items = self.api.statement(token, account_id, from, to).await?;

        let mut created = 0;
        for item in &items {
            if self.reconcile_statement_item(&wallet, item)? {
                created += 1;
            }
        }

        if created > 0 {
            self.categorization
                .apply_rules_to_uncategorized(Some(wallet.id))?;
        }

        let now = self.clock.now();
        wallet.last_sync_at = Some(now);
        wallet.updated_at = now;
        self.repository.upsert_wallet(&wallet)?;

        info!(
            "Statement for {}: {} items, {} new",
            wallet.name,
            items.len(),
            created
        );
        Ok(created)
    }

    /// Reconcile one statement item; returns true when a transaction was created
    ///
    /// An existing transaction only gets its hold flag and balance snapshot
    /// refreshed.
    pub fn reconcile_statement_item(&self, wallet: &Wallet, item: &StatementItem) -> Result<bool> {
        let now = self.clock.now();
        let balance_after = to_major_units(item.balance, &wallet.currency);

        if let Some(mut existing) = self
            .repository
            .find_transaction_by_external_id(wallet.id, &item.id)?
        {
            existing.is_hold = item.hold;
            existing.balance_after = Some(balance_after);
            existing.updated_at = now;
            self.repository.update_transaction(&existing)?;
            return Ok(false);
        }

        let occurred_at = Utc
            .timestamp_opt(item.time, 0)
            .single()
            .ok_or_else(|| Error::data(format!("invalid statement time {}", item.time)))?;

        let mut tx = Transaction::new(
            Uuid::new_v4(),
            wallet.id,
            to_major_units(item.amount, &wallet.currency),
            item.description.clone(),
            occurred_at,
        );
        tx.created_at = now;
        tx.updated_at = now;
        tx.external_id = Some(item.id.clone());
        tx.is_external = true;
        match alpha_code(item.currency_code) {
            Some(operation_currency) => {
                tx.original_amount = Some(to_major_units(item.operation_amount, operation_currency));
                tx.original_currency = Some(operation_currency.to_string());
            }
            None => warn!(
                "Unknown operation currency {} on statement item, original amount dropped",
                item.currency_code
            ),
        }
        tx.mcc = item.mcc.map(|code| format!("{:04}", code));
        tx.is_hold = item.hold;
        tx.balance_after = Some(balance_after);
        tx.cashback = Some(to_major_units(item.cashback_amount, &wallet.currency));
        tx.commission = Some(to_major_units(item.commission_rate, &wallet.currency));

        self.repository.insert_transaction(&tx)?;
        Ok(true)
    }
}

//! DuckDB repository implementation
//!
//! Money and rates are stored as decimal text and timestamps as epoch
//! milliseconds, so values round-trip without loss.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, Row};
use log::warn;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::Result as CoreResult;
use crate::domain::{CategoryRule, ExchangeRate, NewExchangeRate, RuleKind, Transaction, Wallet};
use crate::ports::SyncStateStore;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

// sys_sync_state keys
const STATE_LAST_SUCCESS: &str = "last_success_at";
const STATE_ACCOUNT_IDS: &str = "cached_account_ids";
const STATE_LAST_REMOTE_CALL: &str = "last_remote_call_at";
const STATE_BACKOFF_UNTIL: &str = "remote_backoff_until";

const WALLET_COLUMNS: &str = "wallet_id, name, currency, balance, is_archived, created_at, updated_at,
     last_sync_at, external_id, external_type, masked_pan, iban, credit_limit, cashback_type";

const TRANSACTION_COLUMNS: &str = "transaction_id, wallet_id, amount, description, occurred_at,
     created_at, updated_at, category, subcategory, rule_id, external_id, is_external,
     original_amount, original_currency, mcc, is_hold, balance_after, cashback, commission";

const RULE_COLUMNS: &str =
    "rule_id, kind, pattern, category, subcategory, priority, is_active, created_at";

const RATE_COLUMNS: &str = "rate_id, from_currency, to_currency, rate, buy, sell, source, fetched_at";

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the store at `db_path`
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            "Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Database lock poisoned: {}", e))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run pending schema migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    // === Wallet operations ===

    pub fn get_wallets(&self, include_archived: bool) -> Result<Vec<Wallet>> {
        let conn = self.conn()?;
        let sql = if include_archived {
            format!("SELECT {} FROM sys_wallets ORDER BY created_at, name", WALLET_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM sys_wallets WHERE NOT is_archived ORDER BY created_at, name",
                WALLET_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let wallets = stmt
            .query_map([], row_to_wallet)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(wallets)
    }

    pub fn get_wallet(&self, id: Uuid) -> Result<Option<Wallet>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_wallets WHERE wallet_id = ?",
            WALLET_COLUMNS
        ))?;
        let mut rows = stmt.query_map([id.to_string()], row_to_wallet)?;
        Ok(rows.next().transpose()?)
    }

    /// Wallet linked to a remote account
    pub fn find_wallet_by_external_id(&self, external_id: &str) -> Result<Option<Wallet>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_wallets WHERE external_id = ? ORDER BY created_at LIMIT 1",
            WALLET_COLUMNS
        ))?;
        let mut rows = stmt.query_map([external_id], row_to_wallet)?;
        Ok(rows.next().transpose()?)
    }

    pub fn upsert_wallet(&self, wallet: &Wallet) -> Result<()> {
        let conn = self.conn()?;
        write_wallet(&conn, wallet)
    }

    /// Upsert a batch of wallets in one database transaction
    pub fn upsert_wallets(&self, wallets: &[Wallet]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for wallet in wallets {
            write_wallet(&tx, wallet)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete a wallet and its transactions; returns false if it did not exist
    pub fn delete_wallet(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM sys_transactions WHERE wallet_id = ?",
            [id.to_string()],
        )?;
        let deleted = tx.execute("DELETE FROM sys_wallets WHERE wallet_id = ?", [id.to_string()])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    // === Transaction operations ===

    /// Transactions, newest first
    pub fn get_transactions(
        &self,
        wallet_id: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let limit = limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let transactions = match wallet_id {
            Some(wallet_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sys_transactions WHERE wallet_id = ?
                     ORDER BY occurred_at DESC, created_at DESC LIMIT ?",
                    TRANSACTION_COLUMNS
                ))?;
                let rows = stmt.query_map(params![wallet_id.to_string(), limit], row_to_transaction)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sys_transactions ORDER BY occurred_at DESC, created_at DESC LIMIT ?",
                    TRANSACTION_COLUMNS
                ))?;
                let rows = stmt.query_map([limit], row_to_transaction)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(transactions)
    }

    pub fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_transactions WHERE transaction_id = ?",
            TRANSACTION_COLUMNS
        ))?;
        let mut rows = stmt.query_map([id.to_string()], row_to_transaction)?;
        Ok(rows.next().transpose()?)
    }

    /// Dedup lookup for a remote statement item
    pub fn find_transaction_by_external_id(
        &self,
        wallet_id: Uuid,
        external_id: &str,
    ) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_transactions WHERE wallet_id = ? AND external_id = ?",
            TRANSACTION_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![wallet_id.to_string(), external_id], row_to_transaction)?;
        Ok(rows.next().transpose()?)
    }

    /// Transactions without a category, optionally for one wallet
    pub fn get_uncategorized_transactions(&self, wallet_id: Option<Uuid>) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let (sql, wallet) = match wallet_id {
            Some(id) => (
                format!(
                    "SELECT {} FROM sys_transactions WHERE category IS NULL AND wallet_id = ?
                     ORDER BY occurred_at",
                    TRANSACTION_COLUMNS
                ),
                Some(id.to_string()),
            ),
            None => (
                format!(
                    "SELECT {} FROM sys_transactions WHERE category IS NULL ORDER BY occurred_at",
                    TRANSACTION_COLUMNS
                ),
                None,
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = match wallet {
            Some(wallet) => stmt.query_map([wallet], row_to_transaction)?,
            None => stmt.query_map([], row_to_transaction)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Transactions whose category was assigned by a rule
    pub fn get_rule_attributed_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_transactions WHERE rule_id IS NOT NULL ORDER BY occurred_at",
            TRANSACTION_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_transaction)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sys_transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn insert_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO sys_transactions ({})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TRANSACTION_COLUMNS
            ),
            params![
                tx.id.to_string(),
                tx.wallet_id.to_string(),
                tx.amount.to_string(),
                tx.description,
                tx.occurred_at.timestamp_millis(),
                tx.created_at.timestamp_millis(),
                tx.updated_at.timestamp_millis(),
                tx.category,
                tx.subcategory,
                tx.rule_id.map(|id| id.to_string()),
                tx.external_id,
                tx.is_external,
                tx.original_amount.map(|d| d.to_string()),
                tx.original_currency,
                tx.mcc,
                tx.is_hold,
                tx.balance_after.map(|d| d.to_string()),
                tx.cashback.map(|d| d.to_string()),
                tx.commission.map(|d| d.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Persist the mutable fields of an existing transaction
    pub fn update_transaction(&self, tx: &Transaction) -> Result<()> {
        let conn = self.conn()?;
        write_transaction_update(&conn, tx)
    }

    /// Persist a batch of transaction updates in one database transaction
    pub fn update_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let db_tx = conn.transaction()?;
        for tx in transactions {
            write_transaction_update(&db_tx, tx)?;
        }
        db_tx.commit()?;
        Ok(())
    }

    // === Category rule operations ===

    pub fn insert_rule(&self, rule: &CategoryRule) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO sys_category_rules ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                RULE_COLUMNS
            ),
            params![
                rule.id.to_string(),
                rule.kind.as_str(),
                rule.pattern,
                rule.category,
                rule.subcategory,
                rule.priority,
                rule.is_active,
                rule.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Rules in evaluation order: ascending priority, then insertion order
    pub fn get_rules(&self, active_only: bool) -> Result<Vec<CategoryRule>> {
        let conn = self.conn()?;
        let filter = if active_only { "WHERE is_active" } else { "" };
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_category_rules {} ORDER BY priority ASC, seq ASC",
            RULE_COLUMNS, filter
        ))?;
        let rules = stmt
            .query_map([], row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    pub fn delete_rule(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sys_category_rules WHERE rule_id = ?",
            [id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    pub fn set_rule_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sys_category_rules SET is_active = ? WHERE rule_id = ?",
            params![active, id.to_string()],
        )?;
        Ok(updated > 0)
    }

    // === Exchange rate operations ===

    /// Update the row for (from, to, source) in place, or insert it
    ///
    /// Returns true when a new row was inserted.
    pub fn save_exchange_rate(&self, rate: &NewExchangeRate, fetched_at: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sys_exchange_rates SET rate = ?, buy = ?, sell = ?, fetched_at = ?
             WHERE from_currency = ? AND to_currency = ? AND source = ?",
            params![
                rate.rate.to_string(),
                rate.buy.map(|d| d.to_string()),
                rate.sell.map(|d| d.to_string()),
                fetched_at.timestamp_millis(),
                rate.from_currency,
                rate.to_currency,
                rate.source,
            ],
        )?;
        if updated > 0 {
            return Ok(false);
        }

        conn.execute(
            &format!(
                "INSERT INTO sys_exchange_rates ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                RATE_COLUMNS
            ),
            params![
                Uuid::new_v4().to_string(),
                rate.from_currency,
                rate.to_currency,
                rate.rate.to_string(),
                rate.buy.map(|d| d.to_string()),
                rate.sell.map(|d| d.to_string()),
                rate.source,
                fetched_at.timestamp_millis(),
            ],
        )?;
        Ok(true)
    }

    /// Most recently fetched rate for a pair, from any source, fetched after `since`
    pub fn find_latest_rate(
        &self,
        from: &str,
        to: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<ExchangeRate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_exchange_rates
             WHERE from_currency = ? AND to_currency = ? AND fetched_at > ?
             ORDER BY fetched_at DESC LIMIT 1",
            RATE_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![from, to, since.timestamp_millis()], row_to_rate)?;
        Ok(rows.next().transpose()?)
    }

    pub fn get_exchange_rates(&self) -> Result<Vec<ExchangeRate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_exchange_rates ORDER BY from_currency, to_currency, source",
            RATE_COLUMNS
        ))?;
        let rates = stmt
            .query_map([], row_to_rate)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rates)
    }

    /// Delete rates fetched before `cutoff`
    pub fn delete_rates_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sys_exchange_rates WHERE fetched_at < ?",
            [cutoff.timestamp_millis()],
        )?;
        Ok(deleted)
    }

    // === Sync state ===

    fn get_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT state_value FROM sys_sync_state WHERE state_key = ?")?;
        let mut rows = stmt.query_map([key], |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    }

    fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_sync_state (state_key, state_value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT (state_key) DO UPDATE SET
                state_value = EXCLUDED.state_value,
                updated_at = EXCLUDED.updated_at",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn get_state_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get_state(key)? {
            Some(value) => {
                let ms: i64 = value
                    .parse()
                    .map_err(|e| anyhow!("Invalid timestamp in sync state '{}': {}", key, e))?;
                Ok(Some(millis_to_datetime(ms).ok_or_else(|| {
                    anyhow!("Timestamp out of range in sync state '{}'", key)
                })?))
            }
            None => Ok(None),
        }
    }
}

impl SyncStateStore for DuckDbRepository {
    fn last_success_at(&self) -> CoreResult<Option<DateTime<Utc>>> {
        Ok(self.get_state_time(STATE_LAST_SUCCESS)?)
    }

    fn set_last_success_at(&self, at: DateTime<Utc>) -> CoreResult<()> {
        Ok(self.set_state(STATE_LAST_SUCCESS, &at.timestamp_millis().to_string())?)
    }

    fn cached_account_ids(&self) -> CoreResult<Vec<String>> {
        match self.get_state(STATE_ACCOUNT_IDS)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn set_cached_account_ids(&self, ids: &[String]) -> CoreResult<()> {
        let json = serde_json::to_string(ids)?;
        Ok(self.set_state(STATE_ACCOUNT_IDS, &json)?)
    }

    fn last_remote_call_at(&self) -> CoreResult<Option<DateTime<Utc>>> {
        Ok(self.get_state_time(STATE_LAST_REMOTE_CALL)?)
    }

    fn set_last_remote_call_at(&self, at: DateTime<Utc>) -> CoreResult<()> {
        Ok(self.set_state(STATE_LAST_REMOTE_CALL, &at.timestamp_millis().to_string())?)
    }

    fn backoff_until(&self) -> CoreResult<Option<DateTime<Utc>>> {
        Ok(self.get_state_time(STATE_BACKOFF_UNTIL)?)
    }

    fn set_backoff_until(&self, until: DateTime<Utc>) -> CoreResult<()> {
        Ok(self.set_state(STATE_BACKOFF_UNTIL, &until.timestamp_millis().to_string())?)
    }
}

fn write_wallet(conn: &Connection, wallet: &Wallet) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO sys_wallets ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (wallet_id) DO UPDATE SET
                name = EXCLUDED.name,
                currency = EXCLUDED.currency,
                balance = EXCLUDED.balance,
                is_archived = EXCLUDED.is_archived,
                updated_at = EXCLUDED.updated_at,
                last_sync_at = EXCLUDED.last_sync_at,
                external_id = EXCLUDED.external_id,
                external_type = EXCLUDED.external_type,
                masked_pan = EXCLUDED.masked_pan,
                iban = EXCLUDED.iban,
                credit_limit = EXCLUDED.credit_limit,
                cashback_type = EXCLUDED.cashback_type",
            WALLET_COLUMNS
        ),
        params![
            wallet.id.to_string(),
            wallet.name,
            wallet.currency,
            wallet.balance.to_string(),
            wallet.is_archived,
            wallet.created_at.timestamp_millis(),
            wallet.updated_at.timestamp_millis(),
            wallet.last_sync_at.map(|t| t.timestamp_millis()),
            wallet.external_id,
            wallet.external_type,
            wallet.masked_pan,
            wallet.iban,
            wallet.credit_limit.map(|d| d.to_string()),
            wallet.cashback_type,
        ],
    )?;
    Ok(())
}

// wallet_id and external_id are indexed and never change after insert.
fn write_transaction_update(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "UPDATE sys_transactions SET
            amount = ?, description = ?, occurred_at = ?, updated_at = ?,
            category = ?, subcategory = ?, rule_id = ?,
            original_amount = ?, original_currency = ?, mcc = ?, is_hold = ?,
            balance_after = ?, cashback = ?, commission = ?
         WHERE transaction_id = ?",
        params![
            tx.amount.to_string(),
            tx.description,
            tx.occurred_at.timestamp_millis(),
            tx.updated_at.timestamp_millis(),
            tx.category,
            tx.subcategory,
            tx.rule_id.map(|id| id.to_string()),
            tx.original_amount.map(|d| d.to_string()),
            tx.original_currency,
            tx.mcc,
            tx.is_hold,
            tx.balance_after.map(|d| d.to_string()),
            tx.cashback.map(|d| d.to_string()),
            tx.commission.map(|d| d.to_string()),
            tx.id.to_string(),
        ],
    )?;
    Ok(())
}

// === Row mapping ===

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, ty, err.into())
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn uuid_at(row: &Row, idx: usize) -> duckdb::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, Type::Text, e))
}

fn opt_uuid_at(row: &Row, idx: usize) -> duckdb::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, Type::Text, e)))
        .transpose()
}

fn decimal_at(row: &Row, idx: usize) -> duckdb::Result<Decimal> {
    let s: String = row.get(idx)?;
    s.parse::<Decimal>()
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

fn opt_decimal_at(row: &Row, idx: usize) -> duckdb::Result<Option<Decimal>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| s.parse::<Decimal>().map_err(|e| conversion_error(idx, Type::Text, e)))
        .transpose()
}

fn time_at(row: &Row, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    millis_to_datetime(ms).ok_or_else(|| conversion_error(idx, Type::BigInt, "timestamp out of range"))
}

fn opt_time_at(row: &Row, idx: usize) -> duckdb::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|ms| {
            millis_to_datetime(ms)
                .ok_or_else(|| conversion_error(idx, Type::BigInt, "timestamp out of range"))
        })
        .transpose()
}

fn row_to_wallet(row: &Row) -> duckdb::Result<Wallet> {
    Ok(Wallet {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        currency: row.get(2)?,
        balance: decimal_at(row, 3)?,
        is_archived: row.get(4)?,
        created_at: time_at(row, 5)?,
        updated_at: time_at(row, 6)?,
        last_sync_at: opt_time_at(row, 7)?,
        external_id: row.get(8)?,
        external_type: row.get(9)?,
        masked_pan: row.get(10)?,
        iban: row.get(11)?,
        credit_limit: opt_decimal_at(row, 12)?,
        cashback_type: row.get(13)?,
    })
}

fn row_to_transaction(row: &Row) -> duckdb::Result<Transaction> {
    Ok(Transaction {
        id: uuid_at(row, 0)?,
        wallet_id: uuid_at(row, 1)?,
        amount: decimal_at(row, 2)?,
        description: row.get(3)?,
        occurred_at: time_at(row, 4)?,
        created_at: time_at(row, 5)?,
        updated_at: time_at(row, 6)?,
        category: row.get(7)?,
        subcategory: row.get(8)?,
        rule_id: opt_uuid_at(row, 9)?,
        external_id: row.get(10)?,
        is_external: row.get(11)?,
        original_amount: opt_decimal_at(row, 12)?,
        original_currency: row.get(13)?,
        mcc: row.get(14)?,
        is_hold: row.get(15)?,
        balance_after: opt_decimal_at(row, 16)?,
        cashback: opt_decimal_at(row, 17)?,
        commission: opt_decimal_at(row, 18)?,
    })
}

fn row_to_rule(row: &Row) -> duckdb::Result<CategoryRule> {
    let kind: String = row.get(1)?;
    Ok(CategoryRule {
        id: uuid_at(row, 0)?,
        kind: kind
            .parse::<RuleKind>()
            .map_err(|e| conversion_error(1, Type::Text, e))?,
        pattern: row.get(2)?,
        category: row.get(3)?,
        subcategory: row.get(4)?,
        priority: row.get(5)?,
        is_active: row.get(6)?,
        created_at: time_at(row, 7)?,
    })
}

fn row_to_rate(row: &Row) -> duckdb::Result<ExchangeRate> {
    Ok(ExchangeRate {
        id: uuid_at(row, 0)?,
        from_currency: row.get(1)?,
        to_currency: row.get(2)?,
        rate: decimal_at(row, 3)?,
        buy: opt_decimal_at(row, 4)?,
        sell: opt_decimal_at(row, 5)?,
        source: row.get(6)?,
        fetched_at: time_at(row, 7)?,
    })
}

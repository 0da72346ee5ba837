//! Currency rate service - rate resolution and rate table maintenance
//!
//! Resolution only uses rates fetched within the staleness window. A pair
//! resolves directly, through the stored inverse, or in two hops through the
//! pivot currency, in that order.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use rust_decimal::Decimal;

use crate::adapters::duckdb::DuckDbRepository;
use crate::config::RateSettings;
use crate::domain::currency::normalize_code;
use crate::domain::result::{Error, Result};
use crate::domain::{ExchangeRate, NewExchangeRate};
use crate::ports::Clock;

/// Resolves and maintains exchange rates
pub struct CurrencyRateService {
    repository: Arc<DuckDbRepository>,
    clock: Arc<dyn Clock>,
    settings: RateSettings,
}

impl CurrencyRateService {
    pub fn new(repository: Arc<DuckDbRepository>, clock: Arc<dyn Clock>, settings: RateSettings) -> Self {
        Self {
            repository,
            clock,
            settings,
        }
    }

    fn staleness_cutoff(&self) -> DateTime<Utc> {
        self.clock.now() - Duration::hours(self.settings.staleness_hours)
    }

    /// Stored rate from -> to, or the reciprocal of a stored to -> from
    fn direct_or_inverse(&self, from: &str, to: &str, since: DateTime<Utc>) -> Result<Option<Decimal>> {
        if let Some(direct) = self.repository.find_latest_rate(from, to, since)? {
            return Ok(Some(direct.rate));
        }
        if let Some(inverse) = self.repository.find_latest_rate(to, from, since)? {
            // A zero rate has no reciprocal; treat the pair as unresolved.
            return Ok(Decimal::ONE.checked_div(inverse.rate));
        }
        Ok(None)
    }

    /// Value of one unit of `from` in `to`, None when unavailable
    pub fn get_rate(&self, from: &str, to: &str) -> Result<Option<Decimal>> {
        let from = normalize_code(from);
        let to = normalize_code(to);
        if from == to {
            return Ok(Some(Decimal::ONE));
        }

        let since = self.staleness_cutoff();
        if let Some(rate) = self.direct_or_inverse(&from, &to, since)? {
            return Ok(Some(rate));
        }

        let pivot = normalize_code(&self.settings.pivot_currency);
        if from == pivot || to == pivot {
            debug!("No fresh rate for {}/{}", from, to);
            return Ok(None);
        }

        let first = self.direct_or_inverse(&from, &pivot, since)?;
        let second = self.direct_or_inverse(&pivot, &to, since)?;
        match (first, second) {
            (Some(a), Some(b)) => {
                debug!("Resolved {}/{} through {}", from, to, pivot);
                Ok(a.checked_mul(b))
            }
            _ => {
                debug!("No fresh rate for {}/{} (direct, inverse or via {})", from, to, pivot);
                Ok(None)
            }
        }
    }

    /// Convert an amount, None when no rate resolves
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Option<Decimal>> {
        Ok(self
            .get_rate(from, to)?
            .and_then(|rate| amount.checked_mul(rate)))
    }

    /// Upsert a rate keyed by (from, to, source), stamped with the current time
    ///
    /// Returns true when a new row was inserted.
    pub fn save_rate(&self, rate: &NewExchangeRate) -> Result<bool> {
        if rate.rate <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "rate for {}/{} must be positive, got {}",
                rate.from_currency, rate.to_currency, rate.rate
            )));
        }
        let mut normalized = rate.clone();
        normalized.from_currency = normalize_code(&rate.from_currency);
        normalized.to_currency = normalize_code(&rate.to_currency);
        if normalized.from_currency == normalized.to_currency {
            return Err(Error::validation("cannot store a rate between identical currencies"));
        }

        Ok(self
            .repository
            .save_exchange_rate(&normalized, self.clock.now())?)
    }

    /// Delete rates older than the retention window; returns rows removed
    pub fn cleanup_old_rates(&self) -> Result<usize> {
        let cutoff = self.clock.now() - Duration::days(self.settings.retention_days);
        let deleted = self.repository.delete_rates_before(cutoff)?;
        if deleted > 0 {
            debug!("Deleted {} exchange rates fetched before {}", deleted, cutoff);
        }
        Ok(deleted)
    }

    pub fn list_rates(&self) -> Result<Vec<ExchangeRate>> {
        Ok(self.repository.get_exchange_rates()?)
    }
}

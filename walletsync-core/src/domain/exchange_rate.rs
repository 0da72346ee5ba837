//! Exchange rate domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored rate: one unit of `from_currency` is worth `rate` units of `to_currency`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub id: Uuid,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub buy: Option<Decimal>,
    pub sell: Option<Decimal>,
    /// Where the rate came from ("monobank", "manual", ...)
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

/// Input for saving a rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub buy: Option<Decimal>,
    pub sell: Option<Decimal>,
    pub source: String,
}

impl NewExchangeRate {
    pub fn new(from: &str, to: &str, rate: Decimal, source: &str) -> Self {
        Self {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rate,
            buy: None,
            sell: None,
            source: source.to_string(),
        }
    }
}

/// Effective rate for a published pair
///
/// Prefers the cross rate, then the buy/sell midpoint, then whichever side
/// is present. None when the pair carries no usable number.
pub fn effective_rate(
    cross: Option<Decimal>,
    buy: Option<Decimal>,
    sell: Option<Decimal>,
) -> Option<Decimal> {
    match (cross, buy, sell) {
        (Some(cross), _, _) => Some(cross),
        (None, Some(buy), Some(sell)) => Some((buy + sell) / Decimal::TWO),
        (None, Some(buy), None) => Some(buy),
        (None, None, Some(sell)) => Some(sell),
        (None, None, None) => None,
    }
}

//! Remote banking API port
//!
//! Defines the requests the sync core makes against the remote banking
//! service and the payloads it expects back. `client_info` and `statement`
//! are authorized and share one global per-token rate limit;
//! `currency_rates` is public and unlimited.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::result::Result;

/// Longest statement window the remote service accepts (31 days + 1 hour)
pub const MAX_STATEMENT_SPAN_SECS: i64 = 31 * 24 * 3600 + 3600;

/// Client profile with its accounts
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    #[serde(default)]
    pub client_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub accounts: Vec<RemoteAccount>,
}

/// Account as reported by the remote service; money in minor units
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccount {
    pub id: String,
    pub balance: i64,
    #[serde(default)]
    pub credit_limit: i64,
    /// Numeric ISO 4217 code
    pub currency_code: u16,
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub cashback_type: Option<String>,
    #[serde(default)]
    pub masked_pan: Vec<String>,
    #[serde(default)]
    pub iban: Option<String>,
}

/// One statement line; money in minor units
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementItem {
    pub id: String,
    /// Unix seconds
    pub time: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mcc: Option<u16>,
    #[serde(default)]
    pub hold: bool,
    /// Amount in the account's currency
    pub amount: i64,
    /// Amount in the operation's own currency (`currency_code`)
    pub operation_amount: i64,
    pub currency_code: u16,
    #[serde(default)]
    pub commission_rate: i64,
    #[serde(default)]
    pub cashback_amount: i64,
    /// Account balance after the operation
    pub balance: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Public currency table entry between two numeric codes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRateItem {
    pub currency_code_a: u16,
    pub currency_code_b: u16,
    #[serde(default)]
    pub date: i64,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub rate_buy: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub rate_sell: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub rate_cross: Option<Decimal>,
}

/// Deserialize a JSON number (or numeric string) into Decimal via its text form
fn deserialize_optional_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        Some(JsonValue::Number(n)) => n
            .to_string()
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e))),
        Some(JsonValue::String(s)) => s
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid decimal: {}", e))),
        Some(JsonValue::Null) | None => Ok(None),
        _ => Err(D::Error::custom("expected number or string for rate")),
    }
}

/// Remote banking API
///
/// Implementations only translate HTTP; scheduling and rate limiting are
/// the coordinator's job.
#[async_trait]
pub trait BankApi: Send + Sync {
    /// Fetch the client profile and account list
    async fn client_info(&self, token: &str) -> Result<ClientInfo>;

    /// Fetch statement items for `[from, to]` (unix seconds)
    async fn statement(
        &self,
        token: &str,
        account_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<StatementItem>>;

    /// Fetch the public currency table
    async fn currency_rates(&self) -> Result<Vec<CurrencyRateItem>>;
}

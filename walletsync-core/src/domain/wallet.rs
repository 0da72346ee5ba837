//! Wallet domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::currency;

/// A wallet (account) owned by the user
///
/// Wallets linked to a remote account carry its external id and are kept
/// in sync by the account sync executor. Linked wallets are archived, never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub name: String,
    /// ISO 4217 alphabetic code, uppercase
    pub currency: String,
    pub balance: Decimal,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,

    // =========================================================================
    // External account linkage
    // =========================================================================
    /// Remote account id (dedup key for wallets)
    pub external_id: Option<String>,
    /// Remote account type ("black", "white", "fop", ...)
    pub external_type: Option<String>,
    /// Masked card numbers, comma separated
    pub masked_pan: Option<String>,
    pub iban: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub cashback_type: Option<String>,
}

impl Wallet {
    /// Create a new manual wallet with required fields
    pub fn new(id: Uuid, name: impl Into<String>, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            currency: currency::normalize_code(currency),
            balance: Decimal::ZERO,
            is_archived: false,
            created_at: now,
            updated_at: now,
            last_sync_at: None,
            external_id: None,
            external_type: None,
            masked_pan: None,
            iban: None,
            credit_limit: None,
            cashback_type: None,
        }
    }

    /// True if this wallet mirrors a remote account
    pub fn is_linked(&self) -> bool {
        self.external_id.is_some()
    }

    /// Display name generated for a newly discovered remote account
    ///
    /// `("black", "UAH")` becomes `"Black UAH"`.
    pub fn generated_name(account_type: &str, currency: &str) -> String {
        let account_type = account_type.trim();
        let mut chars = account_type.chars();
        let title = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
            None => "Account".to_string(),
        };
        format!("{} {}", title, currency::normalize_code(currency))
    }

    /// Validate wallet data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("wallet name cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        Ok(())
    }
}

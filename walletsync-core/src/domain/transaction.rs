//! Transaction domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single financial transaction belonging to a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    /// Signed amount in the wallet's currency
    pub amount: Decimal,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // =========================================================================
    // Categorization
    // =========================================================================
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Rule that assigned the current category; None for manual choices
    pub rule_id: Option<Uuid>,

    // =========================================================================
    // Remote statement fields
    // =========================================================================
    /// Remote statement item id, unique per wallet
    pub external_id: Option<String>,
    /// True once created from a remote statement; amount and description are then frozen
    pub is_external: bool,
    /// Amount before conversion, in `original_currency`
    pub original_amount: Option<Decimal>,
    pub original_currency: Option<String>,
    /// Merchant category code, four digits
    pub mcc: Option<String>,
    pub is_hold: bool,
    /// Wallet balance right after this transaction
    pub balance_after: Option<Decimal>,
    pub cashback: Option<Decimal>,
    pub commission: Option<Decimal>,
}

/// User edits to a transaction
#[derive(Debug, Clone, Default)]
pub struct TransactionEdit {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Create a new manual transaction with required fields
    pub fn new(
        id: Uuid,
        wallet_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            wallet_id,
            amount,
            description: description.into(),
            occurred_at,
            created_at: now,
            updated_at: now,
            category: None,
            subcategory: None,
            rule_id: None,
            external_id: None,
            is_external: false,
            original_amount: None,
            original_currency: None,
            mcc: None,
            is_hold: false,
            balance_after: None,
            cashback: None,
            commission: None,
        }
    }

    /// Categorized by the user rather than by a rule
    pub fn is_manually_categorized(&self) -> bool {
        self.category.is_some() && self.rule_id.is_none()
    }

    /// Set a category chosen by the user, dropping any rule attribution
    pub fn set_manual_category(&mut self, category: Option<String>, subcategory: Option<String>) {
        self.category = category;
        self.subcategory = subcategory;
        self.rule_id = None;
        self.updated_at = Utc::now();
    }

    /// Set the category assigned by a rule
    pub fn assign_rule_category(&mut self, rule_id: Uuid, category: &str, subcategory: Option<&str>) {
        self.category = Some(category.to_string());
        self.subcategory = subcategory.map(str::to_string);
        self.rule_id = Some(rule_id);
        self.updated_at = Utc::now();
    }

    /// Remove category and rule attribution
    pub fn clear_categorization(&mut self) {
        self.category = None;
        self.subcategory = None;
        self.rule_id = None;
        self.updated_at = Utc::now();
    }

    /// Apply user edits; externally sourced transactions are read-only
    ///
    /// Their category can still be changed with [`Self::set_manual_category`].
    pub fn apply_edit(&mut self, edit: TransactionEdit) -> Result<(), &'static str> {
        if self.is_external {
            return Err("synced transactions are read-only");
        }
        if let Some(amount) = edit.amount {
            self.amount = amount;
        }
        if let Some(description) = edit.description {
            self.description = description;
        }
        if let Some(occurred_at) = edit.occurred_at {
            self.occurred_at = occurred_at;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

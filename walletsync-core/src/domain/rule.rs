//! Categorization rule domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Transaction;

/// What a rule's pattern is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Exact match on the four digit merchant category code
    MerchantCode,
    /// Case-insensitive substring of the description
    DescriptionContains,
    /// Case-insensitive equality with the description
    DescriptionExact,
    /// Absolute amount equal to a number or within "min-max"
    Amount,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::MerchantCode => "merchant_code",
            RuleKind::DescriptionContains => "description_contains",
            RuleKind::DescriptionExact => "description_exact",
            RuleKind::Amount => "amount",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merchant_code" | "mcc" => Ok(RuleKind::MerchantCode),
            "description_contains" | "contains" => Ok(RuleKind::DescriptionContains),
            "description_exact" | "exact" => Ok(RuleKind::DescriptionExact),
            "amount" | "amount_range" => Ok(RuleKind::Amount),
            other => Err(format!("unknown rule type '{}'", other)),
        }
    }
}

/// Parsed amount pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountPattern {
    Exact(Decimal),
    Range { min: Decimal, max: Decimal },
}

impl AmountPattern {
    /// Parse "min-max" or a single number
    pub fn parse(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        if let Some((min, max)) = pattern.split_once('-') {
            if let (Ok(min), Ok(max)) = (
                Decimal::from_str(min.trim()),
                Decimal::from_str(max.trim()),
            ) {
                return Some(AmountPattern::Range { min, max });
            }
        }
        Decimal::from_str(pattern).ok().map(AmountPattern::Exact)
    }

    /// Whether an absolute amount satisfies the pattern (range bounds inclusive)
    pub fn contains(&self, amount: Decimal) -> bool {
        match *self {
            AmountPattern::Exact(value) => amount == value,
            AmountPattern::Range { min, max } => amount >= min && amount <= max,
        }
    }
}

/// Match predicate built from a rule's kind and pattern
#[derive(Debug, Clone, PartialEq)]
pub enum RuleMatcher {
    MerchantCode(String),
    DescriptionContains(String),
    DescriptionExact(String),
    Amount(AmountPattern),
}

impl RuleMatcher {
    /// Build the matcher; None when the pattern cannot match anything
    pub fn new(kind: RuleKind, pattern: &str) -> Option<Self> {
        match kind {
            RuleKind::MerchantCode => Some(RuleMatcher::MerchantCode(pattern.trim().to_string())),
            RuleKind::DescriptionContains | RuleKind::DescriptionExact => {
                if pattern.trim().is_empty() {
                    return None;
                }
                Some(if kind == RuleKind::DescriptionContains {
                    RuleMatcher::DescriptionContains(pattern.trim().to_lowercase())
                } else {
                    RuleMatcher::DescriptionExact(pattern.to_lowercase())
                })
            }
            RuleKind::Amount => AmountPattern::parse(pattern).map(RuleMatcher::Amount),
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            RuleMatcher::MerchantCode(code) => tx.mcc.as_deref() == Some(code.as_str()),
            RuleMatcher::DescriptionContains(needle) => {
                tx.description.to_lowercase().contains(needle.as_str())
            }
            RuleMatcher::DescriptionExact(text) => tx.description.to_lowercase() == *text,
            RuleMatcher::Amount(pattern) => pattern.contains(tx.amount.abs()),
        }
    }
}

/// A rule assigning a category to matching transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: Uuid,
    pub kind: RuleKind,
    pub pattern: String,
    pub category: String,
    pub subcategory: Option<String>,
    /// Lower values are evaluated first; ties keep creation order
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CategoryRule {
    pub fn matches(&self, tx: &Transaction) -> bool {
        RuleMatcher::new(self.kind, &self.pattern).is_some_and(|m| m.matches(tx))
    }
}

/// Input for creating a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategoryRule {
    pub kind: RuleKind,
    pub pattern: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub priority: i32,
}

impl NewCategoryRule {
    pub fn into_rule(self) -> CategoryRule {
        CategoryRule {
            id: Uuid::new_v4(),
            kind: self.kind,
            pattern: self.pattern.trim().to_string(),
            category: self.category,
            subcategory: self.subcategory,
            priority: self.priority,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Check a pattern before it is persisted
pub fn validate_pattern(kind: RuleKind, pattern: &str) -> Result<(), String> {
    let pattern = pattern.trim();
    match kind {
        RuleKind::MerchantCode => {
            if pattern.len() == 4 && pattern.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err(format!("merchant code must be exactly 4 digits, got '{}'", pattern))
            }
        }
        RuleKind::DescriptionContains | RuleKind::DescriptionExact => {
            if pattern.is_empty() {
                Err("description pattern cannot be blank".to_string())
            } else {
                Ok(())
            }
        }
        RuleKind::Amount => match AmountPattern::parse(pattern) {
            Some(AmountPattern::Range { min, max }) if min >= max => Err(format!(
                "amount range minimum {} must be less than maximum {}",
                min, max
            )),
            Some(_) => Ok(()),
            None => Err(format!(
                "amount pattern must be a number or 'min-max', got '{}'",
                pattern
            )),
        },
    }
}

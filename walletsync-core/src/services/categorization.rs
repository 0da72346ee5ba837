//! Categorization service - rule-based transaction categorization
//!
//! Active rules are evaluated in ascending priority (ties in creation order)
//! and the first match wins. Transactions categorized by the user, i.e. with
//! a category but no rule attribution, are never touched.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::rule::validate_pattern;
use crate::domain::{CategoryRule, NewCategoryRule, RuleKind, Transaction};

/// Categorization fields compared to decide whether a transaction changed
type Categorization = (Option<String>, Option<String>, Option<Uuid>);

fn categorization_of(tx: &Transaction) -> Categorization {
    (tx.category.clone(), tx.subcategory.clone(), tx.rule_id)
}

/// Apply the first matching rule from `rules`, already in priority order
pub fn categorize(tx: &mut Transaction, rules: &[CategoryRule]) -> Option<Uuid> {
    if tx.is_manually_categorized() {
        return None;
    }
    let rule = rules.iter().find(|rule| rule.is_active && rule.matches(tx))?;
    tx.assign_rule_category(rule.id, &rule.category, rule.subcategory.as_deref());
    Some(rule.id)
}

/// Service for rule management and rule application
pub struct CategorizationService {
    repository: Arc<DuckDbRepository>,
}

impl CategorizationService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Reject a malformed pattern before it is persisted
    pub fn validate_rule(&self, kind: RuleKind, pattern: &str) -> Result<()> {
        validate_pattern(kind, pattern).map_err(Error::Validation)
    }

    pub fn add_rule(&self, rule: NewCategoryRule) -> Result<CategoryRule> {
        self.validate_rule(rule.kind, &rule.pattern)?;
        if rule.category.trim().is_empty() {
            return Err(Error::validation("rule category cannot be blank"));
        }
        let rule = rule.into_rule();
        self.repository.insert_rule(&rule)?;
        info!("Added {} rule at priority {}", rule.kind, rule.priority);
        Ok(rule)
    }

    /// All rules in evaluation order, inactive ones included
    pub fn list_rules(&self) -> Result<Vec<CategoryRule>> {
        Ok(self.repository.get_rules(false)?)
    }

    pub fn delete_rule(&self, id: Uuid) -> Result<()> {
        if !self.repository.delete_rule(id)? {
            return Err(Error::not_found(format!("rule {}", id)));
        }
        Ok(())
    }

    pub fn set_rule_active(&self, id: Uuid, active: bool) -> Result<()> {
        if !self.repository.set_rule_active(id, active)? {
            return Err(Error::not_found(format!("rule {}", id)));
        }
        Ok(())
    }

    /// Apply rules to one transaction and persist it if categorization changed
    ///
    /// Returns the matching rule id; None for no match or a manual category.
    pub fn apply_rules(&self, tx: &mut Transaction) -> Result<Option<Uuid>> {
        let rules = self.repository.get_rules(true)?;
        let before = categorization_of(tx);
        let matched = categorize(tx, &rules);
        if matched.is_some() && categorization_of(tx) != before {
            self.repository.update_transaction(tx)?;
        }
        Ok(matched)
    }

    /// Apply rules to a batch; persists once, returns how many changed
    pub fn apply_rules_to_batch(&self, transactions: &mut [Transaction]) -> Result<usize> {
        let rules = self.repository.get_rules(true)?;
        let mut changed = Vec::new();
        for tx in transactions.iter_mut() {
            let before = categorization_of(tx);
            if categorize(tx, &rules).is_some() && categorization_of(tx) != before {
                changed.push(tx.clone());
            }
        }
        self.repository.update_transactions(&changed)?;
        Ok(changed.len())
    }

    /// Apply rules to transactions that have no category yet
    pub fn apply_rules_to_uncategorized(&self, wallet_id: Option<Uuid>) -> Result<usize> {
        let mut transactions = self.repository.get_uncategorized_transactions(wallet_id)?;
        if transactions.is_empty() {
            return Ok(0);
        }
        let changed = self.apply_rules_to_batch(&mut transactions)?;
        debug!(
            "Categorized {} of {} uncategorized transactions",
            changed,
            transactions.len()
        );
        Ok(changed)
    }

    /// Recompute every rule-made categorization from the current rule set
    ///
    /// Rule attributions are cleared and stored first, then every transaction
    /// runs through the rules again. Manual categories are left alone.
    /// Returns how many transactions ended with a different categorization.
    pub fn reapply_all_rules(&self) -> Result<usize> {
        let rules = self.repository.get_rules(true)?;

        let mut attributed = self.repository.get_rule_attributed_transactions()?;
        let previous: HashMap<Uuid, Categorization> = attributed
            .iter()
            .map(|tx| (tx.id, categorization_of(tx)))
            .collect();
        for tx in attributed.iter_mut() {
            tx.clear_categorization();
        }
        self.repository.update_transactions(&attributed)?;

        let mut transactions = self.repository.get_transactions(None, None)?;
        let mut updated = Vec::new();
        let mut changed = 0;
        for tx in transactions.iter_mut() {
            let before = categorization_of(tx);
            categorize(tx, &rules);
            let after = categorization_of(tx);
            if after != before {
                updated.push(tx.clone());
            }
            if previous.get(&tx.id).unwrap_or(&before) != &after {
                changed += 1;
            }
        }

        self.repository.update_transactions(&updated)?;
        info!(
            "Reapplied rules over {} attributed transactions, {} changed",
            previous.len(),
            changed
        );
        Ok(changed)
    }

    /// Set a category chosen by the user; clears rule attribution
    pub fn set_manual_category(
        &self,
        transaction_id: Uuid,
        category: Option<String>,
        subcategory: Option<String>,
    ) -> Result<Transaction> {
        let mut tx = self
            .repository
            .get_transaction(transaction_id)?
            .ok_or_else(|| Error::not_found(format!("transaction {}", transaction_id)))?;
        tx.set_manual_category(category, subcategory);
        self.repository.update_transaction(&tx)?;
        Ok(tx)
    }
}

//! Ledger service - wallets and transactions edited by the user

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Transaction, TransactionEdit, Wallet};
use crate::services::CategorizationService;

/// Counts shown by `status`
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSummary {
    pub wallets: usize,
    pub linked_wallets: usize,
    pub archived_wallets: usize,
    pub transactions: i64,
}

pub struct LedgerService {
    repository: Arc<DuckDbRepository>,
    categorization: Arc<CategorizationService>,
}

impl LedgerService {
    pub fn new(repository: Arc<DuckDbRepository>, categorization: Arc<CategorizationService>) -> Self {
        Self {
            repository,
            categorization,
        }
    }

    pub fn summary(&self) -> Result<LedgerSummary> {
        let wallets = self.repository.get_wallets(true)?;
        Ok(LedgerSummary {
            wallets: wallets.len(),
            linked_wallets: wallets.iter().filter(|w| w.is_linked()).count(),
            archived_wallets: wallets.iter().filter(|w| w.is_archived).count(),
            transactions: self.repository.count_transactions()?,
        })
    }

    pub fn list_wallets(&self, include_archived: bool) -> Result<Vec<Wallet>> {
        Ok(self.repository.get_wallets(include_archived)?)
    }

    /// Create a wallet that is not linked to any remote account
    pub fn create_wallet(&self, name: &str, currency: &str, balance: Decimal) -> Result<Wallet> {
        let mut wallet = Wallet::new(Uuid::new_v4(), name.trim(), currency);
        wallet.balance = balance;
        wallet.validate().map_err(Error::validation)?;
        self.repository.upsert_wallet(&wallet)?;
        Ok(wallet)
    }

    pub fn archive_wallet(&self, id: Uuid, archived: bool) -> Result<Wallet> {
        let mut wallet = self.wallet(id)?;
        wallet.is_archived = archived;
        wallet.updated_at = Utc::now();
        self.repository.upsert_wallet(&wallet)?;
        Ok(wallet)
    }

    /// Delete a manual wallet with its transactions
    ///
    /// Linked wallets can only be archived; the next account refresh would
    /// recreate them otherwise.
    pub fn delete_wallet(&self, id: Uuid) -> Result<()> {
        let wallet = self.wallet(id)?;
        if wallet.is_linked() {
            return Err(Error::validation(format!(
                "wallet '{}' is linked to a bank account; archive it instead",
                wallet.name
            )));
        }
        self.repository.delete_wallet(id)?;
        info!("Deleted wallet {}", id);
        Ok(())
    }

    pub fn list_transactions(&self, wallet_id: Option<Uuid>, limit: Option<usize>) -> Result<Vec<Transaction>> {
        Ok(self.repository.get_transactions(wallet_id, limit)?)
    }

    /// Record a manual transaction; active rules categorize it on the way in
    pub fn create_transaction(
        &self,
        wallet_id: Uuid,
        amount: Decimal,
        description: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Transaction> {
        self.wallet(wallet_id)?;
        let mut tx = Transaction::new(Uuid::new_v4(), wallet_id, amount, description, occurred_at);
        self.categorization.apply_rules(&mut tx)?;
        self.repository.insert_transaction(&tx)?;
        Ok(tx)
    }

    pub fn edit_transaction(&self, id: Uuid, edit: TransactionEdit) -> Result<Transaction> {
        let mut tx = self
            .repository
            .get_transaction(id)?
            .ok_or_else(|| Error::not_found(format!("transaction {}", id)))?;
        tx.apply_edit(edit).map_err(Error::validation)?;
        self.repository.update_transaction(&tx)?;
        Ok(tx)
    }

    fn wallet(&self, id: Uuid) -> Result<Wallet> {
        self.repository
            .get_wallet(id)?
            .ok_or_else(|| Error::not_found(format!("wallet {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewCategoryRule, RuleKind};
    use rust_decimal_macros::dec;

    fn setup() -> (LedgerService, Arc<DuckDbRepository>, Arc<CategorizationService>) {
        let repository = Arc::new(DuckDbRepository::open_in_memory().unwrap());
        repository.ensure_schema().unwrap();
        let categorization = Arc::new(CategorizationService::new(repository.clone()));
        (
            LedgerService::new(repository.clone(), categorization.clone()),
            repository,
            categorization,
        )
    }

    #[test]
    fn test_manual_wallet_lifecycle() {
        let (ledger, _, _) = setup();
        let wallet = ledger.create_wallet("Cash", "usd", dec!(100)).unwrap();
        assert_eq!(wallet.currency, "USD");

        ledger.archive_wallet(wallet.id, true).unwrap();
        assert!(ledger.list_wallets(false).unwrap().is_empty());
        assert_eq!(ledger.list_wallets(true).unwrap().len(), 1);

        ledger.delete_wallet(wallet.id).unwrap();
        assert!(ledger.list_wallets(true).unwrap().is_empty());
        assert!(matches!(ledger.delete_wallet(wallet.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_linked_wallet_cannot_be_deleted() {
        let (ledger, repo, _) = setup();
        let mut wallet = Wallet::new(Uuid::new_v4(), "Black UAH", "UAH");
        wallet.external_id = Some("acc_1".to_string());
        repo.upsert_wallet(&wallet).unwrap();

        assert!(matches!(ledger.delete_wallet(wallet.id), Err(Error::Validation(_))));
        assert!(ledger.archive_wallet(wallet.id, true).unwrap().is_archived);
    }

    #[test]
    fn test_blank_wallet_name_rejected() {
        let (ledger, _, _) = setup();
        assert!(matches!(
            ledger.create_wallet("  ", "UAH", Decimal::ZERO),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_manual_transaction_is_categorized_and_editable() {
        let (ledger, _, categorization) = setup();
        categorization
            .add_rule(NewCategoryRule {
                kind: RuleKind::DescriptionContains,
                pattern: "coffee".to_string(),
                category: "Food".to_string(),
                subcategory: None,
                priority: 1,
            })
            .unwrap();
        let wallet = ledger.create_wallet("Cash", "UAH", Decimal::ZERO).unwrap();

        let tx = ledger
            .create_transaction(wallet.id, dec!(-55), "Morning coffee", Utc::now())
            .unwrap();
        assert_eq!(tx.category.as_deref(), Some("Food"));

        let edited = ledger
            .edit_transaction(
                tx.id,
                TransactionEdit {
                    amount: Some(dec!(-60)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.amount, dec!(-60));
        assert_eq!(ledger.summary().unwrap().transactions, 1);
    }

    #[test]
    fn test_synced_transaction_refuses_every_edit() {
        let (ledger, repo, _) = setup();
        let wallet = ledger.create_wallet("Cash", "UAH", Decimal::ZERO).unwrap();
        let mut tx = Transaction::new(Uuid::new_v4(), wallet.id, dec!(-1), "Bank fee", Utc::now());
        tx.is_external = true;
        tx.external_id = Some("st_1".to_string());
        repo.insert_transaction(&tx).unwrap();

        let err = ledger
            .edit_transaction(
                tx.id,
                TransactionEdit {
                    description: Some("Other".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = ledger
            .edit_transaction(
                tx.id,
                TransactionEdit {
                    occurred_at: Some(Utc::now() - chrono::Duration::days(1)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let stored = repo.get_transaction(tx.id).unwrap().unwrap();
        assert_eq!(stored.occurred_at.timestamp_millis(), tx.occurred_at.timestamp_millis());
    }

    #[test]
    fn test_transaction_requires_wallet() {
        let (ledger, _, _) = setup();
        let err = ledger
            .create_transaction(Uuid::new_v4(), dec!(1), "x", Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

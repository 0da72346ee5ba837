//! Transactions command - list, record and categorize transactions

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use walletsync_core::domain::TransactionEdit;

use super::{get_context, log_command, parse_amount, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List transactions, newest first
    List {
        /// Limit to one wallet
        #[arg(long)]
        wallet: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a manual transaction
    Add {
        wallet: String,
        amount: String,
        description: String,
        /// Date as YYYY-MM-DD, defaults to now
        #[arg(long)]
        date: Option<String>,
    },
    /// Edit a manual transaction; synced ones are read-only
    Edit {
        id: String,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Set a category by hand; rules never override it
    Categorize {
        id: String,
        category: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
    },
}

fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", value))?;
    Ok(date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc())
}

pub fn run(command: TransactionsCommands) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "transactions");

    match command {
        TransactionsCommands::List {
            wallet,
            limit,
            json,
        } => {
            let wallet_id = wallet.as_deref().map(parse_id).transpose()?;
            let transactions = ctx.ledger.list_transactions(wallet_id, Some(limit))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
                return Ok(());
            }
            if transactions.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }

            let wallets = ctx.ledger.list_wallets(true)?;
            let currency_of = |id: uuid::Uuid| {
                wallets
                    .iter()
                    .find(|w| w.id == id)
                    .map(|w| w.currency.clone())
                    .unwrap_or_default()
            };

            let mut table = output::create_table();
            table.set_header(vec!["Date", "Description", "Amount", "Category", "Id"]);
            for tx in transactions {
                let mut category = tx.category.clone().unwrap_or_default();
                if let Some(sub) = &tx.subcategory {
                    category = format!("{} / {}", category, sub);
                }
                let mut description = tx.description.clone();
                if tx.is_hold {
                    description.push_str(" (hold)");
                }
                table.add_row(vec![
                    tx.occurred_at.format("%Y-%m-%d").to_string(),
                    description,
                    output::format_money(tx.amount, &currency_of(tx.wallet_id)),
                    category,
                    tx.id.to_string(),
                ]);
            }
            println!("{}", table);
        }
        TransactionsCommands::Add {
            wallet,
            amount,
            description,
            date,
        } => {
            let occurred_at = match date {
                Some(d) => parse_date(&d)?,
                None => Utc::now(),
            };
            let tx = ctx.ledger.create_transaction(
                parse_id(&wallet)?,
                parse_amount(&amount)?,
                &description,
                occurred_at,
            )?;
            match &tx.category {
                Some(category) => output::success(&format!("Recorded {} ({})", tx.id, category)),
                None => output::success(&format!("Recorded {}", tx.id)),
            }
        }
        TransactionsCommands::Edit {
            id,
            amount,
            description,
            date,
        } => {
            let edit = TransactionEdit {
                amount: amount.as_deref().map(parse_amount).transpose()?,
                description,
                occurred_at: date.as_deref().map(parse_date).transpose()?,
            };
            ctx.ledger.edit_transaction(parse_id(&id)?, edit)?;
            output::success("Transaction updated");
        }
        TransactionsCommands::Categorize {
            id,
            category,
            subcategory,
        } => {
            let tx = ctx
                .categorization
                .set_manual_category(parse_id(&id)?, category, subcategory)?;
            match tx.category {
                Some(category) => output::success(&format!("Category set to {}", category)),
                None => output::success("Category cleared"),
            }
        }
    }

    Ok(())
}

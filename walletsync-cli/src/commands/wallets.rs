//! Wallets command - list and manage wallets

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use rust_decimal::Decimal;

use super::{get_context, log_command, parse_amount, parse_id};
use crate::output;

#[derive(Subcommand)]
pub enum WalletsCommands {
    /// List wallets
    List {
        /// Include archived wallets
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a manual wallet
    Add {
        name: String,
        currency: String,
        /// Opening balance
        #[arg(long)]
        balance: Option<String>,
    },
    /// Archive a wallet (or restore it with --undo)
    Archive {
        id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Delete a manual wallet and its transactions
    Remove { id: String },
}

pub fn run(command: WalletsCommands) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "wallets");

    match command {
        WalletsCommands::List { all, json } => {
            let wallets = ctx.ledger.list_wallets(all)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&wallets)?);
                return Ok(());
            }
            if wallets.is_empty() {
                println!("No wallets yet. Run 'ws sync' or 'ws wallets add'.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Id", "Name", "Balance", "Source", "Last sync"]);
            for wallet in wallets {
                let mut name = wallet.name.clone();
                if wallet.is_archived {
                    name = format!("{} {}", name, "(archived)".dimmed());
                }
                let source = if wallet.is_linked() { "bank" } else { "manual" };
                table.add_row(vec![
                    wallet.id.to_string(),
                    name,
                    output::format_money(wallet.balance, &wallet.currency),
                    source.to_string(),
                    output::format_time(wallet.last_sync_at),
                ]);
            }
            println!("{}", table);
        }
        WalletsCommands::Add {
            name,
            currency,
            balance,
        } => {
            let balance = match balance {
                Some(b) => parse_amount(&b)?,
                None => Decimal::ZERO,
            };
            let wallet = ctx.ledger.create_wallet(&name, &currency, balance)?;
            output::success(&format!("Created wallet {} ({})", wallet.name, wallet.id));
        }
        WalletsCommands::Archive { id, undo } => {
            let wallet = ctx.ledger.archive_wallet(parse_id(&id)?, !undo)?;
            if wallet.is_archived {
                output::success(&format!("Archived {}", wallet.name));
            } else {
                output::success(&format!("Restored {}", wallet.name));
            }
        }
        WalletsCommands::Remove { id } => {
            ctx.ledger.delete_wallet(parse_id(&id)?)?;
            output::success("Wallet deleted");
        }
    }

    Ok(())
}

//! Status command - show wallet summary and sync state

use anyhow::Result;
use colored::Colorize;
use walletsync_core::ports::SecretProvider;

use super::{get_context, log_command};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "status");
    let summary = ctx.ledger.summary()?;
    let snapshot = ctx.coordinator.snapshot();
    let token_configured = ctx.secrets.has_token();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "summary": summary,
                "sync": snapshot,
                "token_configured": token_configured,
                "rate_limit_seconds": ctx.config.sync.rate_limit_seconds,
            }))?
        );
        return Ok(());
    }

    println!("{}", "WalletSync Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Wallets".to_string(), summary.wallets.to_string()]);
    table.add_row(vec!["Linked to bank".to_string(), summary.linked_wallets.to_string()]);
    table.add_row(vec!["Archived".to_string(), summary.archived_wallets.to_string()]);
    table.add_row(vec!["Transactions".to_string(), summary.transactions.to_string()]);
    table.add_row(vec![
        "Last successful sync".to_string(),
        output::format_time(snapshot.last_success_at),
    ]);
    println!("{}", table);
    println!();

    if !token_configured {
        output::warning("No API token configured. Set WALLETSYNC_TOKEN to enable sync.");
    }

    let wallets = ctx.ledger.list_wallets(false)?;
    if !wallets.is_empty() {
        println!("{}", "Wallets".bold());
        for wallet in &wallets {
            println!(
                "  {} {}",
                wallet.name,
                output::format_money(wallet.balance, &wallet.currency)
            );
        }
    }

    Ok(())
}

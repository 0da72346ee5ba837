//! Rates command - exchange rate table and conversions

use anyhow::{anyhow, Result};
use clap::Subcommand;
use walletsync_core::domain::currency::normalize_code;
use walletsync_core::domain::NewExchangeRate;

use super::{get_context, log_command, parse_amount, runtime};
use crate::output;

#[derive(Subcommand)]
pub enum RatesCommands {
    /// Fetch the public rate table from the bank
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert an amount between currencies using stored rates
    Convert {
        amount: String,
        from: String,
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a rate by hand
    Set {
        from: String,
        to: String,
        rate: String,
    },
    /// List stored rates
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete rates older than the retention window
    Cleanup {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: RatesCommands) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "rates");

    match command {
        RatesCommands::Sync { json } => {
            let stored = runtime()?.block_on(ctx.executor.sync_currency_rates())?;
            if json {
                println!("{}", serde_json::json!({ "stored": stored }));
            } else {
                output::success(&format!("Stored {} exchange rates", stored));
            }
        }
        RatesCommands::Convert {
            amount,
            from,
            to,
            json,
        } => {
            let amount = parse_amount(&amount)?;
            let (from, to) = (normalize_code(&from), normalize_code(&to));
            let converted = ctx.rates.convert(amount, &from, &to)?.ok_or_else(|| {
                anyhow!(
                    "No fresh rate for {}/{}; run 'ws rates sync' first",
                    from,
                    to
                )
            })?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "amount": amount,
                        "from": from,
                        "to": to,
                        "converted": converted,
                    })
                );
            } else {
                println!(
                    "{} = {}",
                    output::format_money(amount, &from),
                    output::format_money(converted, &to)
                );
            }
        }
        RatesCommands::Set { from, to, rate } => {
            let rate = parse_amount(&rate)?;
            ctx.rates
                .save_rate(&NewExchangeRate::new(&from, &to, rate, "manual"))?;
            output::success(&format!(
                "Saved {}/{} = {}",
                normalize_code(&from),
                normalize_code(&to),
                rate
            ));
        }
        RatesCommands::List { json } => {
            let rates = ctx.rates.list_rates()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rates)?);
                return Ok(());
            }
            if rates.is_empty() {
                println!("No exchange rates stored.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Pair", "Rate", "Buy", "Sell", "Source", "Fetched"]);
            for rate in rates {
                table.add_row(vec![
                    format!("{}/{}", rate.from_currency, rate.to_currency),
                    rate.rate.to_string(),
                    rate.buy.map(|b| b.to_string()).unwrap_or_default(),
                    rate.sell.map(|s| s.to_string()).unwrap_or_default(),
                    rate.source,
                    output::format_time(Some(rate.fetched_at)),
                ]);
            }
            println!("{}", table);
        }
        RatesCommands::Cleanup { json } => {
            let deleted = ctx.rates.cleanup_old_rates()?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                println!("Deleted {} old exchange rates", deleted);
            }
        }
    }

    Ok(())
}

//! Sync command - run one sync and follow its status stream

use std::io::Write;

use anyhow::{anyhow, Result};
use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;
use walletsync_core::SyncStatus;

use super::{get_context, log_command, runtime};
use crate::output;

pub fn run(refresh_accounts: bool, force: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    log_command(&ctx, "sync");
    let coordinator = ctx.coordinator.clone();

    let throttle = ctx.config.sync.throttle();
    if !force && !coordinator.should_sync(throttle) {
        let last = coordinator
            .last_success_at()
            .map(output::format_age)
            .unwrap_or_default();
        if json {
            println!("{}", serde_json::to_string_pretty(&coordinator.snapshot())?);
        } else {
            output::info(&format!("Last sync was {}; use --force to sync again.", last));
        }
        return Ok(());
    }

    let rt = runtime()?;
    rt.block_on(async {
        let mut rx = coordinator.subscribe();
        if refresh_accounts {
            coordinator.enqueue_full_sync_with_account_refresh();
        } else {
            coordinator.enqueue_full_sync();
        }

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(status) if !json => print_progress(&status),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                _ = coordinator.wait_until_idle() => break,
            }
        }
        if !json {
            // Clear the countdown line.
            println!();
        }
    });

    let snapshot = coordinator.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    match snapshot.status {
        SyncStatus::Completed {
            accounts,
            transactions,
        } => {
            if !json {
                output::success(&format!(
                    "Synced {} accounts, {} new transactions",
                    accounts, transactions
                ));
            }
            Ok(())
        }
        SyncStatus::Failed { reason } => Err(anyhow!("Sync failed: {}", reason)),
        _ => {
            if !json {
                output::warning("Nothing was synced.");
            }
            Ok(())
        }
    }
}

fn print_progress(status: &SyncStatus) {
    match status {
        SyncStatus::Syncing { progress } => {
            print!("\r\x1b[2K{}", progress.cyan());
        }
        SyncStatus::WaitingForRateLimit { seconds_remaining } => {
            print!(
                "\r\x1b[2K{}",
                format!("Waiting for rate limit: {}s", seconds_remaining).yellow()
            );
        }
        _ => {}
    }
    let _ = std::io::stdout().flush();
}

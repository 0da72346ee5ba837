//! WalletSync CLI - bank sync in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

use commands::{logs, rates, rules, status, sync, transactions, wallets};

/// WalletSync - multi-currency bank sync in your terminal
#[derive(Parser)]
#[command(name = "ws", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show wallet summary and sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync accounts and transactions from the bank
    Sync {
        /// Refresh account metadata instead of using cached account ids
        #[arg(long)]
        refresh_accounts: bool,
        /// Sync even if the last successful sync is recent
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Exchange rates
    Rates {
        #[command(subcommand)]
        command: rates::RatesCommands,
    },

    /// Categorization rules
    Rules {
        #[command(subcommand)]
        command: rules::RulesCommands,
    },

    /// Wallets
    Wallets {
        #[command(subcommand)]
        command: wallets::WalletsCommands,
    },

    /// Transactions
    Transactions {
        #[command(subcommand)]
        command: transactions::TransactionsCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // Also installs the bridge for `log` records emitted by the core.
    let _ = fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Sync {
            refresh_accounts,
            force,
            json,
        } => sync::run(refresh_accounts, force, json),
        Commands::Rates { command } => rates::run(command),
        Commands::Rules { command } => rules::run(command),
        Commands::Wallets { command } => wallets::run(command),
        Commands::Transactions { command } => transactions::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}

//! CLI command implementations

pub mod logs;
pub mod rates;
pub mod rules;
pub mod status;
pub mod sync;
pub mod transactions;
pub mod wallets;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use uuid::Uuid;
use walletsync_core::adapters::secrets::EnvSecretProvider;
use walletsync_core::services::EntryPoint;
use walletsync_core::WalletSyncContext;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "WALLETSYNC_DIR";

/// Get the data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".walletsync"))
        .ok_or_else(|| anyhow!("Could not find home directory; set {}", DATA_DIR_ENV))
}

/// Build the context with the token taken from the environment
pub fn get_context() -> Result<WalletSyncContext> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    WalletSyncContext::new(&data_dir, EntryPoint::Cli, Arc::new(EnvSecretProvider))
        .context("Failed to initialize walletsync context")
}

/// Record which command ran; logging never breaks the command
pub fn log_command(ctx: &WalletSyncContext, command: &str) {
    let _ = ctx.logging.log_command(command);
}

/// Runtime for commands that talk to the bank
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

pub fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).with_context(|| format!("Invalid id: {}", value))
}

pub fn parse_amount(value: &str) -> Result<Decimal> {
    value
        .trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid amount: {}", value))
}

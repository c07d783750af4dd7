//! Keystone - command-line entry point
//!
//! Loads configuration, restores the persisted session and runs one
//! command through the API gateway.

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use keystone_infrastructure::KeystoneConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only command output.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = KeystoneConfig::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::debug!(base_url = %config.gateway.base_url, "configuration loaded");

    commands::run(cli.command, &config).await
}

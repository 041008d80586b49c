#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
mod cli;
mod commands;
mod error_fmt;
mod logging;

use clap::Parser;
use eyre::WrapErr;
use std::path::Path;

use crate::cli::{Cli, Commands, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    // Install color-eyre for nicer reports; ignore a second install.
    let _ = color_eyre::install();

    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        if json_mode() {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    logging::init_tracing(cli.json, &level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Ports => commands::ports(),
        Commands::Dispense {
            port,
            volume,
            rate,
            name,
        } => commands::dispense(&cfg, &port, volume, rate, name.as_deref()),
        Commands::Status { port, wait_ms } => commands::status(&cfg, &port, wait_ms),
        Commands::Run { plan } => commands::run(&cfg, plan.as_deref()),
        Commands::Check => commands::check(&cfg),
    }
}

/// A missing file means built-in defaults; an unreadable or invalid one is an error.
fn load_config(path: &Path) -> eyre::Result<pump_config::Config> {
    let cfg = if path.exists() {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        pump_config::load_toml(&text)
            .wrap_err_with(|| format!("failed to parse config file {}", path.display()))?
    } else {
        pump_config::Config::default()
    };
    cfg.validate()
        .wrap_err_with(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

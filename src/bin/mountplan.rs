//! mountplan CLI binary
//!
//! Command-line interface for compiling profiles and generating mount plans.

use anyhow::Context;
use clap::Parser;
use mountplan::cli::{Cli, RunContext};
use mountplan::config::ConfigLoader;
use mountplan::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);

    // Initialize logging early
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("mountplan starting");

    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone(), cli.root.clone())
        .map_err(|e| anyhow::anyhow!(mountplan::cli::map_error(&e)))
        .context("Failed to initialize workspace")?;

    runtime
        .block_on(context.execute(&cli.command))
        .map_err(|e| anyhow::anyhow!(mountplan::cli::map_error(&e)))
}

/// Build logging configuration from CLI args, environment, and config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    // Without --verbose only warnings and errors are shown
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if !cli.verbose {
        config.level = "warn".to_string();
    }

    // CLI arguments have the highest priority
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }

    config
}

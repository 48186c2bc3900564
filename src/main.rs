// src/main.rs

//! The main entry point for the SpinelRelay server application.

use anyhow::Result;
use spinelrelay::config::Config;
use spinelrelay::server;
use std::env;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    // Overridden by build.rs when SPINELRELAY_VERSION is set.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("SpinelRelay version {VERSION}");
        return Ok(());
    }

    // Determine the configuration path. An explicit --config must exist;
    // the default path is optional.
    let explicit_path = args
        .iter()
        .position(|arg| arg == "--config")
        .map(|i| args.get(i + 1).map(|s| s.as_str()));
    let (config_path, explicit) = match explicit_path {
        Some(Some(path)) => (path, true),
        Some(None) => {
            eprintln!("--config flag requires a value");
            std::process::exit(1);
        }
        None => (DEFAULT_CONFIG_PATH, false),
    };

    let use_defaults = !explicit && !Path::new(config_path).exists();
    let mut config = if use_defaults {
        Config::default()
    } else {
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
                std::process::exit(1);
            }
        }
    };

    // Override port if provided as a command-line argument.
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        if let Some(port_str) = args.get(port_index + 1) {
            match port_str.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => {
                    eprintln!("Invalid port number: {port_str}");
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("--port flag requires a value");
            std::process::exit(1);
        }
        if let Err(e) = config.validate() {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    }

    // Initial log level comes from RUST_LOG, falling back to the config.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true),
        )
        .init();

    if use_defaults {
        warn!("No configuration file at \"{DEFAULT_CONFIG_PATH}\"; using built-in defaults.");
    }
    info!("Starting SpinelRelay {VERSION}...");

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}

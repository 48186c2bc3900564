// src/server/initialization.rs

//! Handles server initialization: TLS material, shared state and the listening socket.
//! Any failure here is fatal for the process.

use super::context::ServerContext;
use super::stream::RelayListener;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Result, anyhow};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_rustls::{TlsAcceptor, rustls};
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let acceptor = setup_tls(&config)?;

    let tcp_listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| anyhow!("Failed to bind {}:{}: {}", config.host, config.port, e))?;
    let scheme = if acceptor.is_some() { "wss" } else { "ws" };
    info!(
        "SpinelRelay server listening on {}://{}:{}/ws",
        scheme, config.host, config.port
    );

    let state = ServerState::initialize(config);

    Ok(ServerContext {
        state,
        listener: RelayListener::new(tcp_listener, acceptor),
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

/// Sets up the TLS acceptor if TLS is enabled in the configuration.
fn setup_tls(config: &Config) -> Result<Option<TlsAcceptor>> {
    if config.tls.enabled {
        info!("TLS is enabled. Loading certificate and key.");
        let certs = load_certs(&config.tls.cert_path)?;
        let key = load_key(&config.tls.key_path)?;
        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
    } else {
        Ok(None)
    }
}

/// Loads TLS certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let cert_file = File::open(path)
        .map_err(|e| anyhow!("Failed to open certificate file '{}': {}", path, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(anyhow!("No certificates found in '{}'", path));
    }
    Ok(certs)
}

/// Loads a private key from a PEM file.
fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let key_file = File::open(path)
        .map_err(|e| anyhow!("Failed to open private key file '{}': {}", path, e))?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| anyhow!("No private key found in key file '{}'", path))
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Accepting at most {} concurrent clients.",
        config.max_clients
    );
    if !config.tls.enabled {
        warn!("TLS is disabled. Client traffic, including claimed ids, travels in clear text.");
    }
    if config.metrics.enabled {
        info!("Prometheus metrics enabled on port {}.", config.metrics.port);
    }
}

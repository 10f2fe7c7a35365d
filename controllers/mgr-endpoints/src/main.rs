//! Ceph Mgr Endpoints Controller
//!
//! Publishes the addresses of the services run by the active Ceph manager
//! (dashboard, prometheus exporter) as Kubernetes EndpointSlices, and keeps
//! them current as the active manager moves between hosts.
//!
//! The controller is stateless: every cycle re-reads `mgr services` and the
//! published slices, and writes only what differs.

mod config;
mod controller;
mod error;
mod intent;
mod logging;
mod reconciler;
mod resolver;
mod store;
#[cfg(test)]
mod test_utils;

use crate::config::{ConfigSource, EnvConfigSource, parse_interval};
use crate::error::ControllerError;
use anyhow::{Context, Result};
use ceph_client::{CephCli, CephClient};
use controller::Controller;
use kube::Client;
use logging::LogControl;
use std::env;
use store::KubeEndpointStore;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let source = EnvConfigSource::from_env();
    let config = source.load().context("failed to load configuration")?;
    let log = LogControl::init(config.debug);

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting Ceph Mgr Endpoints Controller");
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace);
    info!("  Parent service: {}", or_unset(&config.parent_service));
    info!("  Dashboard EndpointSlice: {}", or_unset(&config.dashboard_target));
    info!("  Prometheus EndpointSlice: {}", or_unset(&config.prometheus_target));
    info!("  Interval: {:?}{}", config.interval, if config.interval.is_zero() { " (run once)" } else { "" });
    info!("  Config file: {}", source.file().map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()));

    let ceph = CephClient::new(ceph_channel_from_env()?);
    let version = ceph.ping().await.map_err(|e| {
        error!(error = %e, "Failed to connect to ceph cluster");
        ControllerError::Connection(format!("failed to connect to ceph cluster: {e}"))
    })?;
    info!(version = %version, "Connected to ceph cluster");

    // Only needed when something is (or may later be) published
    let store = if config.publishes_anything() || source.is_reloadable() {
        Some(connect_kube().await?)
    } else {
        None
    };

    let shutdown = shutdown_signal().context("failed to install signal handlers")?;
    let controller = Controller::new(ceph, store, source, config, log);
    controller.run(shutdown).await.inspect_err(|e| {
        error!(error = %e, "Run failed");
    })?;

    info!("Ceph Mgr Endpoints Controller stopped");
    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "<unset>" } else { value }
}

fn ceph_channel_from_env() -> Result<CephCli, ControllerError> {
    let mut builder = CephCli::builder();
    if let Ok(binary) = env::var("CEPH_BIN") {
        builder = builder.binary(binary);
    }
    if let Ok(conf) = env::var("CEPH_CONF") {
        builder = builder.conf(conf);
    }
    if let Ok(id) = env::var("CEPH_ID") {
        builder = builder.id(id);
    }
    if let Ok(timeout) = env::var("CEPH_TIMEOUT") {
        let timeout = parse_interval(&timeout)?;
        if timeout.is_zero() {
            return Err(ControllerError::InvalidConfig(
                "CEPH_TIMEOUT must be greater than zero".to_string(),
            ));
        }
        builder = builder.timeout(timeout);
    }
    Ok(builder.build())
}

async fn connect_kube() -> Result<KubeEndpointStore, ControllerError> {
    let client = Client::try_default().await.map_err(|e| {
        error!(error = %e, "Failed to create Kubernetes client");
        ControllerError::Connection(format!("failed to connect to kubernetes: {e}"))
    })?;

    let version = client.apiserver_version().await.map_err(|e| {
        error!(error = %e, "Failed to reach Kubernetes API server");
        ControllerError::Connection(format!("failed to connect to kubernetes: {e}"))
    })?;
    info!(version = %version.git_version, "Connected to Kubernetes API server");

    Ok(KubeEndpointStore::new(client))
}

/// Registers SIGINT and SIGTERM handlers and returns a future that
/// resolves on the first of them.
///
/// Handlers are installed before returning, so a signal that arrives while
/// the startup cycle is still running is held until the future is polled.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT, shutting down after the current cycle"),
            _ = terminate.recv() => info!("Received SIGTERM, shutting down after the current cycle"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

    Ok(async move {
        ctrl_c.recv().await;
        info!("Received Ctrl-C, shutting down after the current cycle");
    })
}

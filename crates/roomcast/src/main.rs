//! # roomcast
//!
//! Server binary: loads settings, starts logging and metrics, and serves
//! rooms over WebSocket until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use roomcast_core::{Hub, HubConfig};
use roomcast_core::logging::init_subscriber;
use roomcast_server::{RoomcastServer, ServerConfig};
use roomcast_settings::RoomcastSettings;

/// Time allowed for open sessions to close after Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Real-time rooms over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "roomcast", about = "Real-time rooms over WebSocket", version)]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.roomcast/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `roomcast_core=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Fold command-line overrides into loaded settings.
    fn apply(&self, settings: &mut RoomcastSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(roomcast_settings::settings_path);
    let mut settings = roomcast_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics = roomcast_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let hub = Arc::new(Hub::new(HubConfig::from(&settings.hub)));
    let config = ServerConfig::from(&settings.server);
    let server = RoomcastServer::new(config, hub).with_metrics(metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        "roomcast listening on ws://{addr}{} ({} kinds registered)",
        settings.server.ws_path,
        server.hub().dispatch().kinds().len()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!(
        sessions = server.shutdown().session_count(),
        "Shutting down..."
    );
    if !server.shutdown().graceful_shutdown(Some(SHUTDOWN_TIMEOUT)).await {
        tracing::warn!("some sessions did not close in time");
    }
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_override_nothing() {
        let cli = Cli::parse_from(["roomcast"]);
        let mut settings = RoomcastSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, RoomcastSettings::default());
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "roomcast",
            "--host",
            "0.0.0.0",
            "--port",
            "9100",
            "--log-level",
            "debug",
            "--config",
            "/etc/roomcast.json",
        ]);
        let mut settings = RoomcastSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/roomcast.json")));
    }

    #[test]
    fn cli_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["roomcast", "--port", "70000"]).is_err());
    }

    #[tokio::test]
    async fn settings_file_drives_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 0, "wsPath": "/rooms"}, "hub": {"sendConcurrency": 8}}"#,
        )
        .unwrap();

        let settings = roomcast_settings::load_settings_from_path(&path).unwrap();
        let hub = Arc::new(Hub::new(HubConfig::from(&settings.hub)));
        let server = RoomcastServer::new(ServerConfig::from(&settings.server), hub);
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.config().ws_path, "/rooms");

        server.shutdown().shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("shutdown timed out")
            .expect("join error");
    }
}

//! # pollbridge
//!
//! Bridge server binary. Loads settings, starts the HTTP adapter and the
//! idle watchdog, and shuts down cleanly on Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pollbridge_core::{Bridge, BridgeConfig};
use pollbridge_server::config::ServerConfig;
use pollbridge_server::server::BridgeServer;
use pollbridge_settings::BridgeSettings;
use pollbridge_settings::loader::apply_overrides_from;

/// HTTP short-polling bridge to a line-oriented chat server.
#[derive(Parser, Debug)]
#[command(name = "pollbridge", about = "HTTP short-polling bridge to a TCP chat server")]
struct Cli {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Chat server host.
    #[arg(long)]
    remote_host: Option<String>,

    /// Chat server port.
    #[arg(long)]
    remote_port: Option<u16>,

    /// Close the session after this many seconds without client activity.
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Directory holding `index.html`, `style.css` and `script.js`.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Directory served under `/games/`.
    #[arg(long)]
    games_dir: Option<PathBuf>,

    /// Settings file (defaults to `~/.pollbridge/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    /// Flags take precedence over file and environment values.
    fn apply(&self, settings: &mut BridgeSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(host) = &self.remote_host {
            settings.remote.host.clone_from(host);
        }
        if let Some(port) = self.remote_port {
            settings.remote.port = port;
        }
        if let Some(secs) = self.idle_timeout_secs {
            settings.session.idle_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(dir) = &self.games_dir {
            settings.server.games_dir = dir.to_string_lossy().into_owned();
        }
    }
}

/// Loaded settings (or defaults plus `POLLBRIDGE_*` overrides when the file
/// is unusable) with CLI flags on top, validated.
fn resolve_settings<F>(
    args: &Cli,
    loaded: &pollbridge_settings::Result<BridgeSettings>,
    lookup: F,
) -> pollbridge_settings::Result<BridgeSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match loaded {
        Ok(settings) => settings.clone(),
        Err(_) => {
            let mut settings = BridgeSettings::default();
            apply_overrides_from(&mut settings, lookup);
            settings
        }
    };
    args.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn bridge_config(settings: &BridgeSettings) -> BridgeConfig {
    BridgeConfig {
        remote_host: settings.remote.host.clone(),
        remote_port: settings.remote.port,
        connect_timeout: Duration::from_millis(settings.remote.connect_timeout_ms),
        read_interval: Duration::from_millis(settings.remote.read_interval_ms),
        idle_timeout: Duration::from_millis(settings.session.idle_timeout_ms),
        watchdog_interval: Duration::from_millis(settings.session.watchdog_interval_ms),
    }
}

/// An empty directory setting disables the corresponding routes.
fn optional_dir(dir: &str) -> Option<PathBuf> {
    (!dir.is_empty()).then(|| PathBuf::from(dir))
}

fn server_config(settings: &BridgeSettings) -> ServerConfig {
    ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        static_dir: optional_dir(&settings.server.static_dir),
        games_dir: optional_dir(&settings.server.games_dir),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(pollbridge_settings::settings_path);
    let loaded = pollbridge_settings::load_settings_from_path(&settings_path);
    let settings = resolve_settings(&args, &loaded, |name| std::env::var(name).ok())
        .context("Invalid settings")?;

    pollbridge_core::logging::init_subscriber(&settings.logging.level);
    if let Err(e) = loaded {
        tracing::warn!(
            path = %settings_path.display(),
            error = %e,
            "Invalid settings file, using defaults with environment overrides"
        );
    }

    let server = Arc::new(BridgeServer::new(
        server_config(&settings),
        Bridge::new(bridge_config(&settings)),
    ));
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;

    tracing::info!(
        remote = %server.bridge().config().remote_addr(),
        "pollbridge listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    handle
        .await
        .context("Server task panicked")?
        .context("Server error")?;

    Ok(())
}

//! shade-server entry point.
//!
//! Loads configuration, opens the motor link, and serves the HTTP transport
//! until Ctrl+C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML file, then CLI/env overrides
//!  └─ build backend
//!       ├─ serial: open_serial_link() + ProtocolEngine   (fails fast)
//!       └─ memory: InMemoryShade
//!  └─ ShadeService::new()    -- one exclusive lock around the backend
//!  └─ http::serve()          -- until Ctrl+C
//! ```
//!
//! Usage:
//! ```text
//! shade-server [--config PATH] [--serial-port PATH] [--motor-address HEX]
//!              [--bind ADDR] [--backend serial|memory] [--log-level LEVEL]
//!              [--print-config]
//! ```
//!
//! Every flag can also be set through its `SHADE_*` environment variable.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shade_core::ProtocolEngine;
use shade_server::application::control_shade::ShadeService;
use shade_server::infrastructure::http;
use shade_server::infrastructure::memory::InMemoryShade;
use shade_server::infrastructure::motor::serial::open_serial_link;
use shade_server::infrastructure::storage::config::{self, Backend, ShadeConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// HTTP service for an RS-485 motorized window shade.
///
/// Values given here override the configuration file.
#[derive(Debug, Parser)]
#[command(name = "shade-server", version)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `$XDG_CONFIG_HOME/shade-server/config.toml`.  A missing
    /// file means built-in defaults.
    #[arg(long, env = "SHADE_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device the RS-485 adapter is attached to.
    #[arg(long, env = "SHADE_SERIAL_PORT")]
    serial_port: Option<String>,

    /// Motor address as printed on its label, e.g. `0c:85:ae`.
    #[arg(long, env = "SHADE_MOTOR_ADDRESS")]
    motor_address: Option<String>,

    /// `ip:port` for the HTTP listener.
    #[arg(long, env = "SHADE_BIND")]
    bind: Option<String>,

    /// Which backend to drive: `serial` or `memory`.
    #[arg(long, env = "SHADE_BACKEND")]
    backend: Option<Backend>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "SHADE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Loads the file configuration and layers the CLI values on top.
    fn resolve_config(&self) -> anyhow::Result<ShadeConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => config::load_config().context("failed to load config")?,
        };

        if let Some(path) = &self.serial_port {
            cfg.serial.path = path.clone();
        }
        if let Some(address) = &self.motor_address {
            cfg.motor.address = address.clone();
        }
        if let Some(bind) = &self.bind {
            cfg.server.bind_address = bind.clone();
        }
        if let Some(backend) = self.backend {
            cfg.server.backend = backend;
        }
        if let Some(level) = &self.log_level {
            cfg.server.log_level = level.clone();
        }

        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.resolve_config()?;

    if cli.print_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.server.log_level)),
        )
        .init();

    info!("shade-server starting (backend = {})", cfg.server.backend);

    let service = build_service(&cfg)?;

    let bind = cfg.bind_address()?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {bind}"))?;

    http::serve(listener, service, shutdown_signal())
        .await
        .context("HTTP transport failed")?;

    info!("shade-server stopped");
    Ok(())
}

/// Creates the configured backend.  A serial port that cannot be opened
/// aborts startup.
fn build_service(cfg: &ShadeConfig) -> anyhow::Result<ShadeService> {
    match cfg.server.backend {
        Backend::Memory => Ok(ShadeService::new(InMemoryShade::new())),
        Backend::Serial => {
            let address = cfg.motor_address()?;
            let link = open_serial_link(&cfg.serial_settings())
                .context("unable to create motor adapter")?;
            let engine = ProtocolEngine::new(link, address).with_retry_policy(cfg.retry_policy());
            info!(motor = %address, "motor adapter ready");
            Ok(ShadeService::new(engine))
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

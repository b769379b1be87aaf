//! RustAuth - username/password authentication service
//!
//! Issues short-lived access tokens and rotating refresh tokens, and revokes
//! them through a per-user token version.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rustauth::{
    config::{Config, ConfigManager},
    security::spawn_sweeper,
    ApiServer, ShutdownCoordinator,
};

/// CLI arguments for RustAuth
#[derive(Parser, Debug)]
#[command(name = "rustauth")]
#[command(about = "RustAuth - authentication service with versioned access and refresh tokens")]
#[command(version)]
#[command(long_about = "
RustAuth - authentication service with versioned access and refresh tokens

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file (environment variables are read only when it is absent)
3. Built-in defaults

JWT_SECRET and REFRESH_TOKEN_SECRET always override the token secrets.

Environment variables:
  RUSTAUTH_BIND_ADDR     - Bind address (e.g., 127.0.0.1:3000)
  RUSTAUTH_PRODUCTION    - Production mode (true/false)
  RUSTAUTH_ACCESS_TTL    - Access token lifetime (e.g., 15m)
  RUSTAUTH_REFRESH_TTL   - Refresh token lifetime (e.g., 30days)
  RUSTAUTH_CORS_ORIGINS  - Comma separated allowed origins
  RUSTAUTH_LOG_LEVEL     - Log level (trace, debug, info, warn, error)
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(short, long, help = "Bind address (e.g., 127.0.0.1:3000)")]
    pub bind: Option<String>,

    /// Port to bind to (overrides config file)
    #[arg(short, long, help = "Port to bind to")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Production mode: secure cookies, no placeholder secrets
    #[arg(long, help = "Enable production mode")]
    pub production: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        ConfigManager::load_from_env()?
    };

    config.merge_with_cli_args(
        args.bind.as_deref(),
        args.port,
        args.log_level.as_deref(),
        args.production,
    );

    config
        .validate()
        .context("Final configuration validation failed")?;

    init_tracing(&args, &config)?;

    info!("Starting RustAuth v{}", env!("CARGO_PKG_VERSION"));

    if args.validate_config {
        info!("Configuration is valid");
        info!("Configuration summary:");
        info!("  Bind address: {}", config.server.bind_addr);
        info!("  Production: {}", config.server.production);
        info!("  Access token TTL: {:?}", config.tokens.access_ttl);
        info!("  Refresh token TTL: {:?}", config.tokens.refresh_ttl);
        info!("  Token version cap: {}", config.tokens.version_cap);
        info!(
            "  Rate limiting: {}",
            if config.rate_limit.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        info!("  Bootstrap users: {}", config.bootstrap.users.len());
        return Ok(());
    }

    let shutdown_coordinator = ShutdownCoordinator::new(config.server.shutdown_timeout);

    let server = ApiServer::new(&config).await?;

    let sweeper_handle = config.rate_limit.enabled.then(|| {
        spawn_sweeper(
            server.limiters().clone(),
            config.rate_limit.sweep_interval,
            shutdown_coordinator.subscribe(),
        )
    });

    let server_rx = shutdown_coordinator.subscribe();
    let mut server_handle = tokio::spawn(async move { server.start(server_rx).await });

    info!("RustAuth started on {}", config.server.bind_addr);
    info!("Press Ctrl+C or send SIGTERM/SIGINT to shutdown gracefully");

    // Server exiting on its own (e.g. failed to bind) also ends the process
    let exited_early = tokio::select! {
        result = shutdown_coordinator.listen_for_signals() => {
            if let Err(e) = result {
                error!("Error setting up signal handlers: {}", e);
                shutdown_coordinator.trigger();
            }
            None
        }
        joined = &mut server_handle => Some(joined),
    };

    info!("Initiating graceful shutdown...");

    let result = match exited_early {
        Some(joined) => {
            shutdown_coordinator.trigger();
            joined.context("Server task failed")?
        }
        None => shutdown_coordinator.wait_for_server(server_handle).await,
    };

    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }

    info!("Server shutdown complete");
    result
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs, config: &Config) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}

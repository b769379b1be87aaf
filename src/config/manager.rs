//! Configuration Manager

use super::types::{DEFAULT_ACCESS_SECRET, DEFAULT_REFRESH_SECRET};
use super::Config;
use crate::auth::validation;
use crate::Result;
use anyhow::{bail, Context};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

// Ten years; keeps token expiry and cookie Max-Age well inside i64 seconds
const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file, falling back to the environment when it is absent
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let mut config = if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using environment and defaults",
                path.display()
            );
            Self::env_overrides(Config::default())?
        };

        Self::secret_overrides(&mut config);

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        tracing::info!("Configuration loaded and validated successfully");
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Self::env_overrides(Config::default())?;
        Self::secret_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn env_overrides(mut config: Config) -> Result<Config> {
        if let Ok(bind_addr) = std::env::var("RUSTAUTH_BIND_ADDR") {
            config.server.bind_addr = bind_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid RUSTAUTH_BIND_ADDR: {}", bind_addr))?;
        }

        if let Ok(production) = std::env::var("RUSTAUTH_PRODUCTION") {
            config.server.production = production
                .parse::<bool>()
                .with_context(|| format!("Invalid RUSTAUTH_PRODUCTION: {}", production))?;
        }

        if let Ok(ttl) = std::env::var("RUSTAUTH_ACCESS_TTL") {
            config.tokens.access_ttl = humantime::parse_duration(&ttl)
                .with_context(|| format!("Invalid RUSTAUTH_ACCESS_TTL: {}", ttl))?;
        }

        if let Ok(ttl) = std::env::var("RUSTAUTH_REFRESH_TTL") {
            config.tokens.refresh_ttl = humantime::parse_duration(&ttl)
                .with_context(|| format!("Invalid RUSTAUTH_REFRESH_TTL: {}", ttl))?;
        }

        if let Ok(origins) = std::env::var("RUSTAUTH_CORS_ORIGINS") {
            config.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(log_level) = std::env::var("RUSTAUTH_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        Ok(config)
    }

    /// Secrets come from the environment whenever it provides them
    fn secret_overrides(config: &mut Config) {
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.tokens.access_secret = secret;
        }

        if let Ok(secret) = std::env::var("REFRESH_TOKEN_SECRET") {
            config.tokens.refresh_secret = secret;
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_token_config()
            .with_context(|| "Token configuration validation failed")?;

        self.validate_password_config()
            .with_context(|| "Password configuration validation failed")?;

        self.validate_rate_limit_config()
            .with_context(|| "Rate limit configuration validation failed")?;

        self.validate_cors_config()
            .with_context(|| "CORS configuration validation failed")?;

        self.validate_logging_config()
            .with_context(|| "Logging configuration validation failed")?;

        self.validate_bootstrap_config()
            .with_context(|| "Bootstrap configuration validation failed")?;

        Ok(())
    }

    fn validate_token_config(&self) -> Result<()> {
        let tokens = &self.tokens;

        if tokens.access_secret.is_empty() || tokens.refresh_secret.is_empty() {
            bail!("access_secret and refresh_secret must not be empty");
        }

        if tokens.access_secret == tokens.refresh_secret {
            bail!("access_secret and refresh_secret must be distinct");
        }

        if self.server.production
            && (tokens.access_secret == DEFAULT_ACCESS_SECRET
                || tokens.refresh_secret == DEFAULT_REFRESH_SECRET)
        {
            bail!("placeholder token secrets cannot be used in production");
        }

        if tokens.access_ttl.is_zero() || tokens.refresh_ttl.is_zero() {
            bail!("access_ttl and refresh_ttl must be greater than 0");
        }

        if tokens.refresh_ttl > MAX_TOKEN_TTL {
            bail!(
                "refresh_ttl must not exceed {}",
                humantime::format_duration(MAX_TOKEN_TTL)
            );
        }

        if tokens.access_ttl >= tokens.refresh_ttl {
            bail!("access_ttl must be shorter than refresh_ttl");
        }

        if tokens.version_cap == 0 {
            bail!("version_cap must be greater than 0");
        }

        Ok(())
    }

    fn validate_password_config(&self) -> Result<()> {
        if self.password.iterations == 0 || self.password.parallelism == 0 {
            bail!("iterations and parallelism must be greater than 0");
        }

        if self.password.memory_kib < 8 * self.password.parallelism {
            bail!("memory_kib must be at least 8 times parallelism");
        }

        Ok(())
    }

    fn validate_rate_limit_config(&self) -> Result<()> {
        let limits = &self.rate_limit;
        if !limits.enabled {
            return Ok(());
        }

        if limits.window.is_zero() || limits.sweep_interval.is_zero() {
            bail!("window and sweep_interval must be greater than 0");
        }

        if limits.login_max_attempts == 0
            || limits.register_max_attempts == 0
            || limits.refresh_max_attempts == 0
        {
            bail!("max attempts must be greater than 0");
        }

        Ok(())
    }

    fn validate_cors_config(&self) -> Result<()> {
        for origin in &self.cors.allowed_origins {
            if origin == "*" {
                bail!("wildcard origin cannot be combined with credentialed requests");
            }

            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid allowed origin: {}", origin))?;
        }

        Ok(())
    }

    fn validate_logging_config(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            bail!(
                "logging.level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    fn validate_bootstrap_config(&self) -> Result<()> {
        for (i, user) in self.bootstrap.users.iter().enumerate() {
            let errors =
                validation::validate_registration(&user.username, &user.password, &user.email);
            if !errors.is_empty() {
                bail!("Bootstrap user {} is invalid: {}", i, errors.join(", "));
            }
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        bind: Option<&str>,
        port: Option<u16>,
        log_level: Option<&str>,
        production: bool,
    ) {
        if let Some(bind_str) = bind {
            if let Ok(addr) = bind_str.parse::<SocketAddr>() {
                self.server.bind_addr = addr;
                tracing::info!("CLI override: bind address set to {}", addr);
            } else {
                tracing::warn!("Invalid bind address provided: {}", bind_str);
            }
        }

        if let Some(port) = port {
            self.server.bind_addr.set_port(port);
            tracing::info!("CLI override: port set to {}", port);
        }

        if let Some(level) = log_level {
            self.logging.level = level.to_string();
            tracing::info!("CLI override: log level set to {}", level);
        }

        if production {
            self.server.production = true;
            tracing::info!("CLI override: production mode enabled");
        }
    }
}

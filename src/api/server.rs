//! API Server

use super::cookies::CookiePolicy;
use super::guard::AuthGuard;
use super::handlers::AppState;
use super::router::create_router;
use crate::auth::{
    Argon2Hasher, MemoryUserStore, SessionManager, UserStore, VersionLedger,
};
use crate::config::{Config, CorsConfig};
use crate::error::AuthError;
use crate::metrics::AuthMetrics;
use crate::security::RateLimiters;
use crate::token::TokenIssuer;
use crate::Result;
use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// HTTP server hosting the authentication API
pub struct ApiServer {
    bind_addr: SocketAddr,
    state: AppState,
    limiters: RateLimiters,
    cors: CorsConfig,
}

impl ApiServer {
    /// Create a server backed by the in-memory user store
    pub async fn new(config: &Config) -> Result<Self> {
        Self::with_store(config, Arc::new(MemoryUserStore::new())).await
    }

    /// Create a server on top of an existing user store
    pub async fn with_store(config: &Config, store: Arc<dyn UserStore>) -> Result<Self> {
        let issuer = Arc::new(TokenIssuer::new(&config.tokens));
        let ledger = Arc::new(VersionLedger::new(
            Arc::clone(&store),
            config.tokens.version_cap,
        ));
        let hasher = Arc::new(
            Argon2Hasher::new(&config.password).context("Failed to configure password hasher")?,
        );
        let sessions = Arc::new(SessionManager::new(
            store,
            Arc::clone(&ledger),
            Arc::clone(&issuer),
            hasher,
        )?);
        let metrics = Arc::new(AuthMetrics::new().context("Failed to register metrics")?);

        let state = AppState {
            sessions,
            guard: Arc::new(AuthGuard::new(issuer, ledger)),
            metrics,
            cookies: CookiePolicy::new(config.server.production, config.tokens.refresh_ttl),
            start_time: SystemTime::now(),
        };

        let server = Self {
            bind_addr: config.server.bind_addr,
            state,
            limiters: RateLimiters::from_config(&config.rate_limit),
            cors: config.cors.clone(),
        };
        server.seed_users(config).await?;

        Ok(server)
    }

    async fn seed_users(&self, config: &Config) -> Result<()> {
        for user in &config.bootstrap.users {
            match self
                .state
                .sessions
                .provision(&user.username, &user.password, &user.email, user.role)
                .await
            {
                Ok(id) => info!("Seeded user '{}' (id {})", user.username, id),
                Err(AuthError::UsernameTaken) => {
                    info!("Bootstrap user '{}' already exists", user.username)
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to seed user '{}'", user.username)));
                }
            }
        }
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn limiters(&self) -> &RateLimiters {
        &self.limiters
    }

    pub fn create_router(&self) -> Router {
        create_router(self.state.clone(), &self.limiters, &self.cors)
    }

    /// Serve until a shutdown signal arrives
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("Starting API server on {}", self.bind_addr);

        let app = self.create_router();

        let listener = TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", self.bind_addr))?;

        info!("API server listening on {}", self.bind_addr);

        let serve = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("API server draining in-flight requests");
        });

        if let Err(e) = serve.await {
            error!("API server error: {}", e);
            return Err(e.into());
        }

        info!("API server stopped");
        Ok(())
    }
}

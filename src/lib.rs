//! RustAuth Library
//!
//! Username/password authentication with short-lived access tokens, rotating
//! single-use refresh tokens and a per-user token version that revokes every
//! outstanding token the moment it moves.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod security;
pub mod shutdown;
pub mod token;

pub use api::ApiServer;
pub use auth::SessionManager;
pub use config::Config;
pub use error::AuthError;
pub use shutdown::ShutdownCoordinator;

/// Common error type for startup and wiring code
pub type Result<T> = anyhow::Result<T>;

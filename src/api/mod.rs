//! HTTP API Module
//!
//! axum router, handlers, auth guard and request throttling.

pub mod cookies;
pub mod guard;
pub mod handlers;
pub mod router;
pub mod server;
pub mod throttle;
pub mod types;

pub use guard::{AuthGuard, AuthenticatedUser};
pub use handlers::AppState;
pub use router::create_router;
pub use server::ApiServer;
pub use types::ApiResponse;

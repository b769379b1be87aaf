//! API Routes

use super::guard::guard_middleware;
use super::handlers::{self, AppState};
use super::throttle::{throttle_middleware, RateLimitGate};
use crate::config::CorsConfig;
use crate::security::{RateLimiters, RateScope};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Build the full application router
pub fn create_router(state: AppState, limiters: &RateLimiters, cors: &CorsConfig) -> Router {
    let throttled = |scope: RateScope, route: MethodRouter<AppState>| {
        let gate = Arc::new(RateLimitGate::new(
            scope,
            Arc::clone(limiters.for_scope(scope)),
            Arc::clone(&state.metrics),
        ));
        route.layer(middleware::from_fn_with_state(gate, throttle_middleware))
    };

    // Public routes (rate limited)
    let public_routes = Router::new()
        .route("/register", throttled(RateScope::Register, post(handlers::register)))
        .route("/login", throttled(RateScope::Login, post(handlers::login)))
        .route(
            "/refreshToken",
            throttled(RateScope::Refresh, post(handlers::refresh_token)),
        );

    // Protected routes (bearer access token required)
    let protected_routes = Router::new()
        .route("/logout", post(handlers::logout))
        .route("/logout-all", post(handlers::logout_all))
        .route("/profile", get(handlers::profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
        .nest("/api", public_routes.merge(protected_routes))
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(cors))
        .with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

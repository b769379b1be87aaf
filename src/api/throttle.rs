//! Per-route request throttling

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::AuthError;
use crate::metrics::AuthMetrics;
use crate::security::{RateDecision, RateLimitStore, RateScope};

/// Limiter bound to one route
pub struct RateLimitGate {
    pub scope: RateScope,
    pub limiter: Arc<dyn RateLimitStore>,
    pub metrics: Arc<AuthMetrics>,
}

impl RateLimitGate {
    pub fn new(scope: RateScope, limiter: Arc<dyn RateLimitStore>, metrics: Arc<AuthMetrics>) -> Self {
        Self {
            scope,
            limiter,
            metrics,
        }
    }

    pub fn check(&self, caller: &str) -> Result<(), AuthError> {
        match self.limiter.check(&self.scope.key(caller)) {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Blocked { retry_after } => {
                warn!(
                    "Rate limit exceeded for {} on {} (retry in {:?})",
                    caller,
                    self.scope.as_str(),
                    retry_after
                );
                self.metrics.record_rate_limited(self.scope.as_str());
                Err(AuthError::RateLimited { retry_after })
            }
        }
    }
}

pub async fn throttle_middleware(
    State(gate): State<Arc<RateLimitGate>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let caller = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    gate.check(&caller)?;
    Ok(next.run(request).await)
}

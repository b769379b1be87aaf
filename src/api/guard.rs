//! Auth Guard
//!
//! Validates bearer access tokens on protected routes. Signature and expiry
//! alone are not enough: the token's version must still match the ledger.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::handlers::AppState;
use crate::auth::VersionLedger;
use crate::error::AuthError;
use crate::token::{AccessClaims, TokenIssuer};

const SESSION_INVALIDATED: &str = "session invalidated, please log in again";

/// Claims of the caller, attached to the request once the guard accepts it
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessClaims);

pub struct AuthGuard {
    issuer: Arc<TokenIssuer>,
    ledger: Arc<VersionLedger>,
}

impl AuthGuard {
    pub fn new(issuer: Arc<TokenIssuer>, ledger: Arc<VersionLedger>) -> Self {
        Self { issuer, ledger }
    }

    /// Accept the request's bearer token or say why not
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AccessClaims, AuthError> {
        let token = extract_bearer(headers)
            .ok_or(AuthError::Unauthenticated("authentication token required"))?;

        let claims = self.issuer.verify_access_token(token)?;

        if claims.user_id() == 0 || claims.subject.username.is_empty() {
            return Err(AuthError::TokenInvalid);
        }

        match self.ledger.current_version(claims.user_id()).await? {
            Some(version) if version == claims.token_version() => Ok(claims),
            Some(version) => {
                debug!(
                    "Access token version {} is stale for user {} (ledger at {})",
                    claims.token_version(),
                    claims.user_id(),
                    version
                );
                Err(AuthError::Unauthenticated(SESSION_INVALIDATED))
            }
            None => {
                debug!("Access token names unknown user {}", claims.user_id());
                Err(AuthError::Unauthenticated(SESSION_INVALIDATED))
            }
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn rejection_reason(err: &AuthError) -> &'static str {
    match err {
        AuthError::TokenExpired => "expired",
        AuthError::TokenInvalid => "invalid",
        AuthError::Unauthenticated(SESSION_INVALIDATED) => "stale_version",
        AuthError::Unauthenticated(_) => "missing",
        _ => "error",
    }
}

/// Middleware for protected routes
pub async fn guard_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let verdict = state.guard.authenticate(request.headers()).await;
    match verdict {
        Ok(claims) => {
            debug!("Guard accepted user {}", claims.user_id());
            request.extensions_mut().insert(AuthenticatedUser(claims));
            Ok(next.run(request).await)
        }
        Err(err) => {
            debug!("Guard rejected request to {}: {}", request.uri().path(), err);
            state.metrics.record_guard_rejection(rejection_reason(&err));
            Err(err)
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::Unauthenticated("authentication token required"))
    }
}

//! Authentication Errors
//!
//! Every failure a client can observe maps to exactly one variant here, and
//! every variant maps to exactly one HTTP status. Messages for credential and
//! token failures are deliberately vague.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::api::types::ApiResponse;
use crate::auth::store::StoreError;
use crate::token::TokenError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Client input failed validation; carries every violation found.
    #[error("{}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    #[error("username already exists")]
    UsernameTaken,

    /// Same response whether the username or the password was wrong.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("authentication token has expired")]
    TokenExpired,

    #[error("invalid authentication token")]
    TokenInvalid,

    /// Refresh token misuse: wrong type, unknown token, stale version.
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("user not found")]
    NotFound,

    #[error(
        "too many requests, please retry in {} minute(s)",
        .retry_after.as_secs().div_ceil(60).max(1)
    )]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ValidationFailed(_) | AuthError::UsernameTaken => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated(_)
            | AuthError::TokenExpired
            | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername(_) => AuthError::UsernameTaken,
            StoreError::UserNotFound(_) => AuthError::NotFound,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid | TokenError::WrongType => AuthError::TokenInvalid,
            TokenError::Signing(e) => AuthError::Internal(e.into()),
            err @ TokenError::LifetimeOutOfRange(_) => AuthError::Internal(err.into()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AuthError::ValidationFailed(errors) => {
                ApiResponse::failure(status, self.to_string(), Some(json!({ "errors": errors })))
            }
            AuthError::Internal(e) => {
                error!("Internal error while handling request: {:#}", e);
                ApiResponse::failure(status, "internal server error".to_string(), None)
            }
            _ => ApiResponse::failure(status, self.to_string(), None),
        };

        let mut response = (status, Json(body)).into_response();

        if let AuthError::RateLimited { retry_after } = &self {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

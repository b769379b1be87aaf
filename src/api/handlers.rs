//! API Handlers

use super::cookies::{presented_refresh_token, CookiePolicy};
use super::guard::{AuthGuard, AuthenticatedUser};
use super::types::*;
use crate::auth::{SessionManager, UserProfile};
use crate::error::AuthError;
use crate::metrics::{
    AuthMetrics, OUTCOME_ERROR, OUTCOME_INVALID_CREDENTIALS, OUTCOME_REJECTED, OUTCOME_SUCCESS,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::SystemTime;
use tower_cookies::Cookies;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub guard: Arc<AuthGuard>,
    pub metrics: Arc<AuthMetrics>,
    pub cookies: CookiePolicy,
    pub start_time: SystemTime,
}

fn outcome_label(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidCredentials => OUTCOME_INVALID_CREDENTIALS,
        AuthError::Internal(_) => OUTCOME_ERROR,
        _ => OUTCOME_REJECTED,
    }
}

/// Malformed JSON is reported like any other validation failure
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| {
            AuthError::ValidationFailed(vec![format!(
                "invalid request body: {}",
                rejection.body_text()
            )])
        })
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    Json(ApiResponse::ok(
        "ok",
        HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
        },
    ))
}

/// Prometheus exposition
pub async fn export_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RegisterResponse>>, AuthError> {
    let result = match json_body(payload) {
        Ok(request) => {
            state
                .sessions
                .register(&request.username, &request.password, &request.email)
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(user_id) => {
            state.metrics.record_registration(OUTCOME_SUCCESS);
            Ok(Json(ApiResponse::ok(
                "registration successful",
                RegisterResponse { user_id },
            )))
        }
        Err(err) => {
            state.metrics.record_registration(outcome_label(&err));
            Err(err)
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, AuthError> {
    let result = match json_body(payload) {
        Ok(request) => state.sessions.login(&request.username, &request.password).await,
        Err(err) => Err(err),
    };

    let outcome = result.map_err(|err| {
        state.metrics.record_login(outcome_label(&err));
        err
    })?;
    state.metrics.record_login(OUTCOME_SUCCESS);

    state.cookies.set_refresh(&cookies, outcome.refresh_token);

    Ok(Json(ApiResponse::ok(
        "login successful",
        LoginResponse {
            user_id: outcome.user_id,
            username: outcome.username,
            token: outcome.access_token,
        },
    )))
}

/// Rotate the session; a rejected refresh also clears the browser cookie
pub async fn refresh_token(State(state): State<AppState>, cookies: Cookies) -> Response {
    let presented = presented_refresh_token(&cookies);

    match state.sessions.refresh(presented.as_deref()).await {
        Ok(outcome) => {
            state.metrics.record_refresh(OUTCOME_SUCCESS);
            state.cookies.set_refresh(&cookies, outcome.refresh_token);

            Json(ApiResponse::ok(
                "token refreshed",
                RefreshResponse {
                    token: outcome.access_token,
                },
            ))
            .into_response()
        }
        Err(err) => {
            state.metrics.record_refresh(outcome_label(&err));
            if matches!(err, AuthError::Forbidden(_)) {
                state.cookies.clear(&cookies);
            }
            err.into_response()
        }
    }
}

pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<ApiResponse<serde_json::Value>>, AuthError> {
    state.sessions.logout(claims.user_id()).await?;
    state.metrics.record_logout();

    state.cookies.clear(&cookies);
    Ok(Json(ApiResponse::ok_empty("logout successful")))
}

pub async fn logout_all(
    State(state): State<AppState>,
    cookies: Cookies,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<ApiResponse<LogoutAllResponse>>, AuthError> {
    let token_version = state.sessions.logout_all(claims.user_id()).await?;
    state.metrics.record_logout_all();

    state.cookies.clear(&cookies);
    Ok(Json(ApiResponse::ok(
        "logged out of all devices",
        LogoutAllResponse { token_version },
    )))
}

pub async fn profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<ApiResponse<UserProfile>>, AuthError> {
    let profile = state.sessions.profile(claims.user_id()).await?;
    Ok(Json(ApiResponse::ok("ok", profile)))
}

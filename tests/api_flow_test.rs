//! Session Lifecycle Integration Tests

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::connect_info::MockConnectInfo,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use rustauth::{
    auth::{MemoryUserStore, Status, UserStore},
    config::{Config, PasswordConfig},
    ApiServer,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    server: ApiServer,
    store: Arc<MemoryUserStore>,
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.password = PasswordConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
    config
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryUserStore::new());
    let server = ApiServer::with_store(&test_config(), store.clone())
        .await
        .unwrap();
    let router = server
        .create_router()
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

    TestApp {
        router,
        server,
        store,
    }
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    bytes: Bytes,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }

    /// Value of the refreshToken cookie set by this response
    fn refresh_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| cookie.strip_prefix("refreshToken="))
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    }

    fn set_cookie_header(&self) -> String {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn post_with_bearer(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Bearer request from a browser that still holds its refresh cookie
    async fn post_from_browser(&self, uri: &str, token: &str, cookie: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::COOKIE, format!("refreshToken={cookie}"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn get_with_bearer(&self, uri: &str, token: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn refresh(&self, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("POST").uri("/api/refreshToken");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, format!("refreshToken={cookie}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn register(&self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/register",
            json!({
                "username": username,
                "password": password,
                "email": format!("{username}@example.com"),
            }),
        )
        .await
    }

    async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/login",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Register and log in, returning (user id, access token, refresh cookie)
    async fn signed_in(&self, username: &str) -> (u64, String, String) {
        assert_eq!(self.register(username, "secret1").await.status, StatusCode::OK);
        let response = self.login(username, "secret1").await;
        assert_eq!(response.status, StatusCode::OK);

        let body = response.json();
        (
            body["data"]["userId"].as_u64().unwrap(),
            body["data"]["token"].as_str().unwrap().to_string(),
            response.refresh_cookie().unwrap(),
        )
    }
}

#[tokio::test]
async fn test_login_token_carries_ledger_version() {
    let app = spawn_app().await;
    let (user_id, token, cookie) = app.signed_in("alice").await;

    let claims = app
        .server
        .state()
        .sessions
        .issuer()
        .verify_access_token(&token)
        .unwrap();
    let user = app.store.find_by_id(user_id).await.unwrap().unwrap();

    assert_eq!(claims.token_version(), user.token_version);
    assert_eq!(user.refresh_token.as_deref(), Some(cookie.as_str()));
}

#[tokio::test]
async fn test_login_body_and_cookie() {
    let app = spawn_app().await;
    app.register("bruno", "secret1").await;

    let response = app.login("bruno", "secret1").await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["username"], "bruno");
    assert!(body["data"]["token"].is_string());
    assert!(body["data"].get("refreshToken").is_none());
    assert!(body["data"].get("passwordHash").is_none());

    let cookie = response.set_cookie_header();
    assert!(cookie.starts_with("refreshToken="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=2592000"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let app = spawn_app().await;
    let (user_id, _, first_cookie) = app.signed_in("carla").await;

    let refreshed = app.refresh(Some(&first_cookie)).await;
    assert_eq!(refreshed.status, StatusCode::OK);
    let body = refreshed.json();
    assert!(body["data"]["token"].is_string());

    let second_cookie = refreshed.refresh_cookie().unwrap();
    assert_ne!(second_cookie, first_cookie);

    let user = app.store.find_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.token_version, 2);

    let replay = app.refresh(Some(&first_cookie)).await;
    assert_eq!(replay.status, StatusCode::FORBIDDEN);
    assert!(replay.set_cookie_header().contains("Max-Age=0"));

    // The rotated cookie is unaffected by the failed replay
    assert_eq!(app.refresh(Some(&second_cookie)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_requires_cookie() {
    let app = spawn_app().await;

    assert_eq!(app.refresh(None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.refresh(Some("garbage")).await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_refreshed_access_token_supersedes_old_one() {
    let app = spawn_app().await;
    let (_, old_token, cookie) = app.signed_in("dario").await;

    let refreshed = app.refresh(Some(&cookie)).await;
    let new_token = refreshed.json()["data"]["token"]
        .as_str()
        .unwrap()
        .to_string();

    assert_eq!(
        app.get_with_bearer("/api/profile", &old_token).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get_with_bearer("/api/profile", &new_token).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_logout_all_invalidates_access_tokens() {
    let app = spawn_app().await;
    let (user_id, token, cookie) = app.signed_in("elena").await;

    let response = app
        .post_from_browser("/api/logout-all", &token, &cookie)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.set_cookie_header().contains("Max-Age=0"));

    let rejected = app.get_with_bearer("/api/profile", &token).await;
    assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        rejected.json()["message"],
        "session invalidated, please log in again"
    );

    assert_eq!(app.refresh(Some(&cookie)).await.status, StatusCode::FORBIDDEN);

    let user = app.store.find_by_id(user_id).await.unwrap().unwrap();
    assert!(user.refresh_token.is_none());
}

#[tokio::test]
async fn test_logout_keeps_access_token_valid() {
    let app = spawn_app().await;
    let (user_id, token, cookie) = app.signed_in("fabio").await;

    let response = app.post_from_browser("/api/logout", &token, &cookie).await;
    assert_eq!(response.status, StatusCode::OK);
    let cleared = response.set_cookie_header();
    assert!(cleared.starts_with("refreshToken=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert!(cleared.contains("HttpOnly"));
    assert!(cleared.contains("Path=/"));

    assert_eq!(
        app.get_with_bearer("/api/profile", &token).await.status,
        StatusCode::OK
    );
    assert_eq!(app.refresh(Some(&cookie)).await.status, StatusCode::FORBIDDEN);

    let user = app.store.find_by_id(user_id).await.unwrap().unwrap();
    assert!(user.refresh_token.is_none());
}

#[tokio::test]
async fn test_logout_without_cookie_sets_nothing() {
    let app = spawn_app().await;
    let (user_id, token, _) = app.signed_in("felix").await;

    let response = app.post_with_bearer("/api/logout", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.get(header::SET_COOKIE).is_none());

    let user = app.store.find_by_id(user_id).await.unwrap().unwrap();
    assert!(user.refresh_token.is_none());
}

#[tokio::test]
async fn test_credential_failures_are_byte_identical() {
    let app = spawn_app().await;
    app.register("gemma", "secret1").await;

    let wrong_password = app.login("gemma", "not-the-password").await;
    let unknown_user = app.login("nobody-here", "secret1").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.status, unknown_user.status);
    assert_eq!(wrong_password.bytes, unknown_user.bytes);
    assert!(wrong_password.refresh_cookie().is_none());
}

#[tokio::test]
async fn test_blank_login_is_validation_error() {
    let app = spawn_app().await;

    let response = app.post_json("/api/login", json!({ "username": "" })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json()["data"]["errors"],
        json!(["username is required", "password is required"])
    );
}

#[tokio::test]
async fn test_disabled_account_cannot_refresh() {
    let app = spawn_app().await;
    let (user_id, _, cookie) = app.signed_in("hugo").await;

    app.store
        .update_user(user_id, |user| user.status = Status::Disabled)
        .await
        .unwrap();

    assert_eq!(app.refresh(Some(&cookie)).await.status, StatusCode::FORBIDDEN);
    assert_eq!(
        app.login("hugo", "secret1").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_profile_is_public_projection() {
    let app = spawn_app().await;
    let (user_id, token, _) = app.signed_in("irene").await;

    let response = app.get_with_bearer("/api/profile", &token).await;
    assert_eq!(response.status, StatusCode::OK);

    let data = &response.json()["data"];
    assert_eq!(data["id"], user_id);
    assert_eq!(data["username"], "irene");
    assert_eq!(data["email"], "irene@example.com");
    assert_eq!(data["role"], "user");
    assert_eq!(data["status"], "active");
    assert!(data["createdAt"].is_string());
    assert!(data["lastLoginTime"].is_string());
    assert!(data.get("passwordHash").is_none());
    assert!(data.get("refreshToken").is_none());
    assert!(data.get("tokenVersion").is_none());
}

#[tokio::test]
async fn test_guard_rejections() {
    let app = spawn_app().await;
    let (user_id, _, _) = app.signed_in("jonas").await;

    let missing = app
        .send(
            Request::builder()
                .uri("/api/profile")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let garbage = app.get_with_bearer("/api/profile", "not.a.token").await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.json()["message"], "invalid authentication token");

    let user = app.store.find_by_id(user_id).await.unwrap().unwrap();
    let expired = app
        .server
        .state()
        .sessions
        .issuer()
        .issue_access_token_at(&user.subject(), Utc::now() - ChronoDuration::hours(1))
        .unwrap();
    let response = app.get_with_bearer("/api/profile", &expired).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["message"], "authentication token has expired");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = spawn_app().await;
    app.signed_in("kira").await;

    let health = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["data"]["status"], "healthy");

    let metrics = app
        .send(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(metrics.status, StatusCode::OK);
    let text = String::from_utf8(metrics.bytes.to_vec()).unwrap();
    assert!(text.contains("rustauth_logins_total{outcome=\"success\"} 1"));
    assert!(text.contains("rustauth_registrations_total{outcome=\"success\"} 1"));
}

//! Session Manager
//!
//! Orchestrates register, login, refresh, logout and logout-all on top of the
//! credential store, the token issuer and the version ledger.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::ledger::VersionLedger;
use super::password::PasswordHasher;
use super::store::UserStore;
use super::types::{NewUser, Role, User, UserId, UserProfile};
use super::validation;
use crate::error::AuthError;
use crate::token::TokenIssuer;

// Verified against when the username is unknown so both failure paths cost the same.
const TIMING_EQUALIZER_PASSWORD: &str = "rustauth-timing-equalizer";

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: UserId,
    pub username: String,
    pub access_token: String,
    /// Delivered only through the protected cookie, never the body.
    pub refresh_token: String,
    pub token_version: u32,
}

/// Result of a successful refresh
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub token_version: u32,
}

/// Manages the token lifecycle for every user
pub struct SessionManager {
    store: Arc<dyn UserStore>,
    ledger: Arc<VersionLedger>,
    issuer: Arc<TokenIssuer>,
    hasher: Arc<dyn PasswordHasher>,
    dummy_digest: String,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        store: Arc<dyn UserStore>,
        ledger: Arc<VersionLedger>,
        issuer: Arc<TokenIssuer>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> crate::Result<Self> {
        let dummy_digest = hasher
            .hash(TIMING_EQUALIZER_PASSWORD)
            .context("Failed to prepare timing equalizer digest")?;

        Ok(Self {
            store,
            ledger,
            issuer,
            hasher,
            dummy_digest,
        })
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// Register a regular user account
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<UserId, AuthError> {
        self.provision(username, password, email, Role::User).await
    }

    /// Create an account with an explicit role
    pub async fn provision(
        &self,
        username: &str,
        password: &str,
        email: &str,
        role: Role,
    ) -> Result<UserId, AuthError> {
        let errors = validation::validate_registration(username, password, email);
        if !errors.is_empty() {
            debug!("Registration rejected: {}", errors.join(", "));
            return Err(AuthError::ValidationFailed(errors));
        }

        let username = username.trim();
        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hash_password(password).await?;
        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                password_hash,
                email: email.trim().to_lowercase(),
                role,
            })
            .await?;

        info!("Registered user '{}' (id {}, role {:?})", user.username, user.id, user.role);
        Ok(user.id)
    }

    /// Authenticate credentials and open a new session
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let errors = validation::validate_login(username, password);
        if !errors.is_empty() {
            return Err(AuthError::ValidationFailed(errors));
        }

        let username = username.trim();
        let Some(user) = self.store.find_by_username(username).await? else {
            self.verify_password(password, &self.dummy_digest).await?;
            warn!("Failed login for unknown user '{}'", username);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            warn!("Failed login for user '{}': wrong password", username);
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active() {
            warn!("Failed login for user '{}': account disabled", username);
            return Err(AuthError::InvalidCredentials);
        }

        let token_version = self.ledger.advance(user.token_version);
        let (access_token, refresh_token) = self.issue_pair(&user, token_version)?;

        self.ledger
            .open_session(user.id, token_version, &refresh_token)
            .await?;
        self.store.record_login(user.id, Utc::now()).await?;

        info!("User '{}' logged in (token version {})", user.username, token_version);

        Ok(LoginOutcome {
            user_id: user.id,
            username: user.username,
            access_token,
            refresh_token,
            token_version,
        })
    }

    /// Exchange a refresh token for a new pair; each refresh token works once.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<RefreshOutcome, AuthError> {
        let presented = match presented {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::Unauthenticated("refresh token required")),
        };

        let claims = self.issuer.verify_refresh_token(presented).map_err(|e| {
            debug!("Refresh token rejected: {}", e);
            AuthError::Forbidden("refresh token expired or invalid, please log in again")
        })?;

        let user = match self.store.find_by_refresh_token(presented).await? {
            Some(user) if user.id == claims.subject.user_id && user.is_active() => user,
            _ => {
                warn!(
                    "Refresh token for user {} is not the stored one (replayed or superseded)",
                    claims.subject.user_id
                );
                return Err(AuthError::Forbidden("invalid refresh token"));
            }
        };

        if claims.subject.token_version != user.token_version {
            warn!(
                "Refresh token version {} does not match ledger version {} for user {}",
                claims.subject.token_version, user.token_version, user.id
            );
            self.ledger.close_session(user.id).await?;
            return Err(AuthError::Forbidden("session invalidated, please log in again"));
        }

        let token_version = self.ledger.advance(user.token_version);
        let (access_token, refresh_token) = self.issue_pair(&user, token_version)?;

        let rotated = self
            .ledger
            .rotate_session(user.id, user.token_version, presented, token_version, &refresh_token)
            .await?;
        if !rotated {
            warn!("Concurrent refresh for user {} lost the race", user.id);
            return Err(AuthError::Forbidden("session invalidated, please log in again"));
        }

        debug!("Rotated session for user {} to version {}", user.id, token_version);

        Ok(RefreshOutcome {
            access_token,
            refresh_token,
            token_version,
        })
    }

    /// Revoke the refresh capability; outstanding access tokens stay valid.
    pub async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.ledger.close_session(user_id).await?;
        info!("User {} logged out", user_id);
        Ok(())
    }

    /// Invalidate every token the user holds, on every device
    pub async fn logout_all(&self, user_id: UserId) -> Result<u32, AuthError> {
        let version = self.ledger.revoke_all(user_id).await?;
        info!("User {} logged out of all devices (token version {})", user_id, version);
        Ok(version)
    }

    pub async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(|user| user.profile())
            .ok_or(AuthError::NotFound)
    }

    fn issue_pair(&self, user: &User, token_version: u32) -> Result<(String, String), AuthError> {
        let mut subject = user.subject();
        subject.token_version = token_version;

        let access_token = self.issuer.issue_access_token(&subject)?;
        let refresh_token = self.issuer.issue_refresh_token(&subject)?;
        Ok((access_token, refresh_token))
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();

        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("Password hashing task failed")??;
        Ok(digest)
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let digest = digest.to_string();

        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .context("Password verification task failed")??;
        Ok(verified)
    }
}

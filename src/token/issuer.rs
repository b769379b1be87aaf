//! Token Issuer
//!
//! Access and refresh tokens are HS256 JWTs signed with two independent
//! secrets, so leaking one secret never lets an attacker forge the other kind.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::claims::{AccessClaims, RefreshClaims, TokenSubject, REFRESH_TOKEN_TYPE};
use crate::config::TokenConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is invalid")]
    Invalid,

    #[error("token is not a refresh token")]
    WrongType,

    #[error("token lifetime of {0:?} is out of range")]
    LifetimeOutOfRange(Duration),

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Mints and verifies token pairs
pub struct TokenIssuer {
    access_keys: SigningKeys,
    refresh_keys: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenIssuer {
    /// Create an issuer from token configuration
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            access_keys: SigningKeys::from_secret(&config.access_secret),
            refresh_keys: SigningKeys::from_secret(&config.refresh_secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            validation,
        }
    }

    /// Issue an access token valid from now
    pub fn issue_access_token(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        self.issue_access_token_at(subject, Utc::now())
    }

    /// Issue an access token as if it had been minted at `issued_at`
    pub fn issue_access_token_at(
        &self,
        subject: &TokenSubject,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = issued_at.timestamp();
        let claims = AccessClaims {
            subject: subject.clone(),
            iat,
            exp: expiry(iat, self.access_ttl)?,
        };
        sign(&claims, &self.access_keys)
    }

    /// Issue a refresh token valid from now
    pub fn issue_refresh_token(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        self.issue_refresh_token_at(subject, Utc::now())
    }

    /// Issue a refresh token as if it had been minted at `issued_at`
    pub fn issue_refresh_token_at(
        &self,
        subject: &TokenSubject,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = issued_at.timestamp();
        let claims = RefreshClaims {
            subject: subject.clone(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat,
            exp: expiry(iat, self.refresh_ttl)?,
        };
        sign(&claims, &self.refresh_keys)
    }

    /// Verify signature and expiry of an access token
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token, &self.access_keys)
    }

    /// Verify signature, expiry and type discriminator of a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.verify(token, &self.refresh_keys)?;
        if !claims.is_refresh() {
            return Err(TokenError::WrongType);
        }
        Ok(claims)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, keys: &SigningKeys) -> Result<T, TokenError> {
        decode::<T>(token, &keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

fn expiry(iat: i64, ttl: Duration) -> Result<i64, TokenError> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| iat.checked_add(secs))
        .ok_or(TokenError::LifetimeOutOfRange(ttl))
}

fn sign<T: Serialize>(claims: &T, keys: &SigningKeys) -> Result<String, TokenError> {
    Ok(encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)?)
}

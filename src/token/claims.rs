//! Token Claims

use serde::{Deserialize, Serialize};

use crate::auth::types::{Role, Status, UserId};

/// Discriminator value carried by every refresh token
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Identity stamped into both token types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSubject {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub status: Status,
    pub token_version: u32,
}

/// Claims of a short-lived access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(flatten)]
    pub subject: TokenSubject,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of a long-lived refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(flatten)]
    pub subject: TokenSubject,
    #[serde(rename = "type")]
    pub token_type: String,
    /// Unique per issued token so the stored value never repeats.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> UserId {
        self.subject.user_id
    }

    pub fn token_version(&self) -> u32 {
        self.subject.token_version
    }
}

impl RefreshClaims {
    pub fn is_refresh(&self) -> bool {
        self.token_type == REFRESH_TOKEN_TYPE
    }
}

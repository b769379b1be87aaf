//! Authentication Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::token::TokenSubject;

/// Stable user identifier assigned by the store
pub type UserId = u64;

/// Account role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Account status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Disabled,
}

/// User record as persisted by a [`UserStore`](super::UserStore)
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub status: Status,
    /// Revocation counter; every token embeds the value current at issue time.
    pub token_version: u32,
    /// Last-issued refresh token, `None` when no session can be refreshed.
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_time: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    /// Token identity stamped with the user's current version
    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            user_id: self.id,
            username: self.username.clone(),
            role: self.role,
            status: self.status,
            token_version: self.token_version,
        }
    }

    /// Public projection returned by the profile endpoint
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            phone: self.phone.clone(),
            role: self.role,
            created_at: self.created_at,
            last_login_time: self.last_login_time,
            status: self.status,
        }
    }
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
}

/// Profile data safe to hand to the account owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub status: Status,
}

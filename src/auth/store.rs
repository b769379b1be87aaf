//! Credential Store
//!
//! Persistence seam for user records. Every mutating operation that touches
//! `token_version` or `refresh_token` is a single atomic update so that a
//! concurrent login and refresh can never interleave into a lost update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use super::ledger::next_version;
use super::types::{NewUser, User, UserId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username '{0}' already exists")]
    DuplicateUsername(String),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user with version 0 and no refresh token
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Option<User>>;

    /// Set version and refresh token together
    async fn store_session(
        &self,
        id: UserId,
        token_version: u32,
        refresh_token: &str,
    ) -> StoreResult<()>;

    /// Set version and refresh token only if both still hold the expected
    /// values. Returns `false` when another writer got there first.
    async fn rotate_session(
        &self,
        id: UserId,
        expected_version: u32,
        expected_refresh_token: &str,
        token_version: u32,
        refresh_token: &str,
    ) -> StoreResult<bool>;

    async fn set_refresh_token(&self, id: UserId, refresh_token: Option<&str>) -> StoreResult<()>;

    /// Advance the version (wrapping past `cap`) and clear the refresh token.
    /// Returns the new version.
    async fn revoke_all(&self, id: UserId, cap: u32) -> StoreResult<u32>;

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    by_username: HashMap<String, UserId>,
}

impl Tables {
    fn user_mut(&mut self, id: UserId) -> StoreResult<&mut User> {
        self.users.get_mut(&id).ok_or(StoreError::UserNotFound(id))
    }
}

/// In-process store; state is lost on restart
#[derive(Debug)]
pub struct MemoryUserStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Apply an arbitrary edit to a stored user (administrative changes such as disabling)
    pub async fn update_user<F>(&self, id: UserId, edit: F) -> StoreResult<()>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut tables = self.tables.write().await;
        edit(tables.user_mut(id)?);
        Ok(())
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        if tables.by_username.contains_key(&new_user.username) {
            return Err(StoreError::DuplicateUsername(new_user.username));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let user = User {
            id,
            username: new_user.username,
            password_hash: new_user.password_hash,
            email: new_user.email,
            nickname: None,
            avatar: None,
            phone: None,
            role: new_user.role,
            status: Default::default(),
            token_version: 0,
            refresh_token: None,
            created_at: Utc::now(),
            last_login_time: None,
        };

        tables.by_username.insert(user.username.clone(), id);
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_username
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.refresh_token.as_deref() == Some(refresh_token))
            .cloned())
    }

    async fn store_session(
        &self,
        id: UserId,
        token_version: u32,
        refresh_token: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        user.token_version = token_version;
        user.refresh_token = Some(refresh_token.to_string());
        Ok(())
    }

    async fn rotate_session(
        &self,
        id: UserId,
        expected_version: u32,
        expected_refresh_token: &str,
        token_version: u32,
        refresh_token: &str,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;

        if user.token_version != expected_version
            || user.refresh_token.as_deref() != Some(expected_refresh_token)
        {
            return Ok(false);
        }

        user.token_version = token_version;
        user.refresh_token = Some(refresh_token.to_string());
        Ok(true)
    }

    async fn set_refresh_token(&self, id: UserId, refresh_token: Option<&str>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.user_mut(id)?.refresh_token = refresh_token.map(str::to_string);
        Ok(())
    }

    async fn revoke_all(&self, id: UserId, cap: u32) -> StoreResult<u32> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        user.token_version = next_version(user.token_version, cap);
        user.refresh_token = None;
        Ok(user.token_version)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.user_mut(id)?.last_login_time = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::Role;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "digest".to_string(),
            email: format!("{username}@example.com"),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("erin")).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.token_version, 0);
        assert!(user.refresh_token.is_none());

        let by_name = store.find_by_username("erin").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert!(store.find_by_id(user.id).await.unwrap().is_some());
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryUserStore::new();
        store.create_user(new_user("frank")).await.unwrap();

        let err = store.create_user(new_user("frank")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername(name) if name == "frank"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_session_and_lookup_by_refresh_token() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("gina")).await.unwrap();

        store.store_session(user.id, 1, "refresh-a").await.unwrap();

        let found = store.find_by_refresh_token("refresh-a").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.token_version, 1);
        assert!(store.find_by_refresh_token("refresh-b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_session_is_compare_and_set() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("hank")).await.unwrap();
        store.store_session(user.id, 1, "refresh-a").await.unwrap();

        assert!(store.rotate_session(user.id, 1, "refresh-a", 2, "refresh-b").await.unwrap());
        // Second writer holding the same stale view loses
        assert!(!store.rotate_session(user.id, 1, "refresh-a", 2, "refresh-c").await.unwrap());

        let current = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(current.token_version, 2);
        assert_eq!(current.refresh_token.as_deref(), Some("refresh-b"));
    }

    #[tokio::test]
    async fn test_revoke_all_advances_and_clears() {
        let store = MemoryUserStore::new();
        let user = store.create_user(new_user("ivy")).await.unwrap();
        store.store_session(user.id, 3, "refresh-a").await.unwrap();

        assert_eq!(store.revoke_all(user.id, 8).await.unwrap(), 4);

        let current = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(current.token_version, 4);
        assert!(current.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_missing_user_operations_fail() {
        let store = MemoryUserStore::new();
        assert!(matches!(
            store.set_refresh_token(99, None).await,
            Err(StoreError::UserNotFound(99))
        ));
        assert!(matches!(
            store.revoke_all(99, 8).await,
            Err(StoreError::UserNotFound(99))
        ));
    }
}

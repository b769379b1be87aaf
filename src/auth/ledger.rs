//! Version Ledger
//!
//! The per-user `token_version` is the only revocation mechanism: a token is
//! live only while its embedded version equals the ledger's. The counter is
//! bounded and wraps back to 0 once it exceeds the configured cap.

use std::sync::Arc;

use super::store::{StoreResult, UserStore};
use super::types::UserId;

pub const DEFAULT_VERSION_CAP: u32 = 8;

/// Version following `current`, wrapping to 0 once `current` exceeds `cap`
pub fn next_version(current: u32, cap: u32) -> u32 {
    if current > cap {
        0
    } else {
        current + 1
    }
}

/// Reads and advances token versions through the credential store
pub struct VersionLedger {
    store: Arc<dyn UserStore>,
    cap: u32,
}

impl VersionLedger {
    pub fn new(store: Arc<dyn UserStore>, cap: u32) -> Self {
        Self { store, cap }
    }

    pub fn advance(&self, current: u32) -> u32 {
        next_version(current, self.cap)
    }

    /// Live version for a user, `None` if the user no longer exists
    pub async fn current_version(&self, id: UserId) -> StoreResult<Option<u32>> {
        Ok(self
            .store
            .find_by_id(id)
            .await?
            .map(|user| user.token_version))
    }

    /// Record a freshly issued session (login)
    pub async fn open_session(&self, id: UserId, version: u32, refresh_token: &str) -> StoreResult<()> {
        self.store.store_session(id, version, refresh_token).await
    }

    /// Swap in a rotated session; `false` if the presented one was already superseded
    pub async fn rotate_session(
        &self,
        id: UserId,
        presented_version: u32,
        presented_token: &str,
        version: u32,
        refresh_token: &str,
    ) -> StoreResult<bool> {
        self.store
            .rotate_session(id, presented_version, presented_token, version, refresh_token)
            .await
    }

    /// Drop the refresh capability, leaving outstanding access tokens alone
    pub async fn close_session(&self, id: UserId) -> StoreResult<()> {
        self.store.set_refresh_token(id, None).await
    }

    /// Invalidate every outstanding token for the user
    pub async fn revoke_all(&self, id: UserId) -> StoreResult<u32> {
        self.store.revoke_all(id, self.cap).await
    }
}

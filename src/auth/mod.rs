//! Authentication Module
//!
//! Handles user records, credential checks and the session lifecycle.

pub mod ledger;
pub mod manager;
pub mod password;
pub mod store;
pub mod types;
pub mod validation;

pub use ledger::{next_version, VersionLedger};
pub use manager::{LoginOutcome, RefreshOutcome, SessionManager};
pub use password::{Argon2Hasher, PasswordHasher};
pub use store::{MemoryUserStore, StoreError, UserStore};
pub use types::{NewUser, Role, Status, User, UserId, UserProfile};

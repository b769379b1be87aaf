//! Security Module
//!
//! Request throttling for the credential endpoints.

pub mod rate_limiter;

pub use rate_limiter::{
    spawn_sweeper, FixedWindowLimiter, RateDecision, RateLimitConfig, RateLimitStore,
    RateLimiters, Unlimited,
};

/// Throttled endpoint, used as the key prefix and metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    Login,
    Register,
    Refresh,
}

impl RateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateScope::Login => "login",
            RateScope::Register => "register",
            RateScope::Refresh => "refresh",
        }
    }

    /// Counter key for a caller within this scope
    pub fn key(&self, caller: &str) -> String {
        format!("{}:{}", self.as_str(), caller)
    }
}

impl RateLimiters {
    pub fn for_scope(&self, scope: RateScope) -> &std::sync::Arc<dyn RateLimitStore> {
        match scope {
            RateScope::Login => &self.login,
            RateScope::Register => &self.register,
            RateScope::Refresh => &self.refresh,
        }
    }
}

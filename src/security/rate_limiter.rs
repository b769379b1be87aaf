//! Rate Limiting Implementation
//!
//! Fixed-window attempt counting keyed by `<scope>:<caller>`. Counters live in
//! process memory only and reset on restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    pub login_max_attempts: u32,
    pub register_max_attempts: u32,
    pub refresh_max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            login_max_attempts: 50,
            register_max_attempts: 100,
            refresh_max_attempts: 100,
        }
    }
}

/// Outcome of a single rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Blocked { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Counting capability used by the HTTP throttle
pub trait RateLimitStore: Send + Sync {
    /// Record one attempt for `key` and decide whether it may proceed
    fn check(&self, key: &str) -> RateDecision;

    /// Drop expired windows, returning how many were removed
    fn sweep(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed counting window per key
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_attempts: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut windows = self.windows.lock();

        let entry = windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                count: 0,
                reset_at: now + self.window,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        if entry.count >= self.max_attempts {
            return RateDecision::Blocked {
                retry_after: entry.reset_at - now,
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max_attempts - entry.count,
        }
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let initial_count = windows.len();
        windows.retain(|_, window| window.reset_at > now);
        initial_count - windows.len()
    }
}

impl RateLimitStore for FixedWindowLimiter {
    fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }
}

/// Store used when rate limiting is switched off
#[derive(Debug, Default)]
pub struct Unlimited;

impl RateLimitStore for Unlimited {
    fn check(&self, _key: &str) -> RateDecision {
        RateDecision::Allowed {
            remaining: u32::MAX,
        }
    }

    fn sweep(&self) -> usize {
        0
    }
}

/// One limiter per throttled endpoint
#[derive(Clone)]
pub struct RateLimiters {
    pub login: Arc<dyn RateLimitStore>,
    pub register: Arc<dyn RateLimitStore>,
    pub refresh: Arc<dyn RateLimitStore>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            let unlimited: Arc<dyn RateLimitStore> = Arc::new(Unlimited);
            return Self {
                login: unlimited.clone(),
                register: unlimited.clone(),
                refresh: unlimited,
            };
        }

        Self {
            login: Arc::new(FixedWindowLimiter::new(config.login_max_attempts, config.window)),
            register: Arc::new(FixedWindowLimiter::new(
                config.register_max_attempts,
                config.window,
            )),
            refresh: Arc::new(FixedWindowLimiter::new(
                config.refresh_max_attempts,
                config.window,
            )),
        }
    }

    pub fn sweep_all(&self) -> usize {
        self.login.sweep() + self.register.sweep() + self.refresh.sweep()
    }
}

/// Periodically drop expired windows until shutdown is signalled
pub fn spawn_sweeper(
    limiters: RateLimiters,
    every: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = limiters.sweep_all();
                    if removed > 0 {
                        debug!("Swept {} expired rate limit windows", removed);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    })
}

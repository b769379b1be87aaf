//! Metrics Collector

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

/// Login outcome label values
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_INVALID_CREDENTIALS: &str = "invalid_credentials";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_ERROR: &str = "error";

/// Prometheus counters for the session lifecycle
pub struct AuthMetrics {
    prometheus_registry: Registry,

    logins_total: IntCounterVec,
    refreshes_total: IntCounterVec,
    registrations_total: IntCounterVec,
    logouts_total: IntCounter,
    logout_all_total: IntCounter,
    rate_limited_total: IntCounterVec,
    guard_rejections_total: IntCounterVec,
}

impl AuthMetrics {
    /// Create and register all counters
    pub fn new() -> prometheus::Result<Self> {
        let prometheus_registry = Registry::new();

        let logins_total = IntCounterVec::new(
            Opts::new("rustauth_logins_total", "Login attempts by outcome"),
            &["outcome"],
        )?;
        let refreshes_total = IntCounterVec::new(
            Opts::new("rustauth_refreshes_total", "Token refresh attempts by outcome"),
            &["outcome"],
        )?;
        let registrations_total = IntCounterVec::new(
            Opts::new("rustauth_registrations_total", "Registration attempts by outcome"),
            &["outcome"],
        )?;
        let logouts_total = IntCounter::new("rustauth_logouts_total", "Single-device logouts")?;
        let logout_all_total =
            IntCounter::new("rustauth_logout_all_total", "Logouts from all devices")?;
        let rate_limited_total = IntCounterVec::new(
            Opts::new("rustauth_rate_limited_total", "Requests rejected by the rate limiter"),
            &["scope"],
        )?;
        let guard_rejections_total = IntCounterVec::new(
            Opts::new(
                "rustauth_guard_rejections_total",
                "Protected requests rejected by the auth guard",
            ),
            &["reason"],
        )?;

        prometheus_registry.register(Box::new(logins_total.clone()))?;
        prometheus_registry.register(Box::new(refreshes_total.clone()))?;
        prometheus_registry.register(Box::new(registrations_total.clone()))?;
        prometheus_registry.register(Box::new(logouts_total.clone()))?;
        prometheus_registry.register(Box::new(logout_all_total.clone()))?;
        prometheus_registry.register(Box::new(rate_limited_total.clone()))?;
        prometheus_registry.register(Box::new(guard_rejections_total.clone()))?;

        Ok(Self {
            prometheus_registry,
            logins_total,
            refreshes_total,
            registrations_total,
            logouts_total,
            logout_all_total,
            rate_limited_total,
            guard_rejections_total,
        })
    }

    pub fn record_login(&self, outcome: &str) {
        self.logins_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_refresh(&self, outcome: &str) {
        self.refreshes_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_registration(&self, outcome: &str) {
        self.registrations_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_logout(&self) {
        self.logouts_total.inc();
    }

    pub fn record_logout_all(&self) {
        self.logout_all_total.inc();
    }

    pub fn record_rate_limited(&self, scope: &str) {
        self.rate_limited_total.with_label_values(&[scope]).inc();
    }

    pub fn record_guard_rejection(&self, reason: &str) {
        self.guard_rejections_total.with_label_values(&[reason]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.prometheus_registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "Failed to encode Prometheus metrics");
                String::new()
            }
        }
    }
}

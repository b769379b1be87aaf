//! Metrics Module
//!
//! Prometheus counters for authentication events.

pub mod collector;

pub use collector::{
    AuthMetrics, OUTCOME_ERROR, OUTCOME_INVALID_CREDENTIALS, OUTCOME_REJECTED, OUTCOME_SUCCESS,
};

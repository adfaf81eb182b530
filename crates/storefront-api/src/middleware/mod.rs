//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`metrics`]: Prometheus request metrics and catalog gauges.
//! - [`rate_limit`]: per-caller fixed-window rate limiting.

pub mod metrics;
pub mod rate_limit;

//! Push-based observability
//!
//! Metrics are kept in a private Prometheus registry and periodically logged
//! as JSON. This module only sends data; it never accepts requests.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;

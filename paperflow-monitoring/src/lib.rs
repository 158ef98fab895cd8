//! # paperflow-monitoring
//!
//! Sliding-window monitoring: P95 latency, throughput, error rate, queue
//! depth, and configurable SLA evaluation with breach accounting.

pub mod service;
pub mod sla;
pub mod window;

pub use service::{MetricsSnapshot, MonitoringService};
pub use sla::{default_slas, SlaBreach, SlaComparison, SlaDefinition, SlaSeverity};
pub use window::SlidingWindow;

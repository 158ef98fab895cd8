//! SLA thresholds and review-queue timing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    /// Review SLA granted at claim time (hours).
    pub sla_default_hours: i64,
    /// A claim older than this is released back to pending (minutes).
    pub claim_expiry_minutes: i64,

    // Operational SLA thresholds evaluated by the monitor.
    pub sla_p95_latency_seconds: f64,
    pub sla_throughput_docs_per_hour: f64,
    pub sla_error_rate_percent: f64,
    pub sla_queue_depth_warning: f64,
    pub sla_breach_percent: f64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            sla_default_hours: 24,
            claim_expiry_minutes: 30,
            sla_p95_latency_seconds: 30.0,
            sla_throughput_docs_per_hour: 4500.0,
            sla_error_rate_percent: 1.0,
            sla_queue_depth_warning: 500.0,
            sla_breach_percent: 0.1,
        }
    }
}

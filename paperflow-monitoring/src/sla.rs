//! SLA rule definitions and breach records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paperflow_core::config::SlaConfig;

/// Direction of an SLA threshold.
///
/// `Lt` means the metric should stay *below* the threshold (a reading at or
/// above it breaches); `Gt` means the metric should stay *above* it (a
/// reading below breaches).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaComparison {
    Lt,
    Gt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaSeverity {
    Warning,
    Critical,
}

/// A single SLA rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaDefinition {
    pub name: String,
    pub metric_name: String,
    pub threshold: f64,
    pub comparison: SlaComparison,
    pub window_minutes: u32,
    pub severity: SlaSeverity,
}

impl SlaDefinition {
    pub fn is_breached(&self, current_value: f64) -> bool {
        match self.comparison {
            SlaComparison::Lt => current_value >= self.threshold,
            SlaComparison::Gt => current_value < self.threshold,
        }
    }
}

/// One recorded SLA violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaBreach {
    pub sla: String,
    pub metric: String,
    pub threshold: f64,
    pub current_value: f64,
    pub severity: SlaSeverity,
    pub timestamp: DateTime<Utc>,
}

/// Build the standard rule set from configured thresholds.
pub fn default_slas(config: &SlaConfig) -> Vec<SlaDefinition> {
    vec![
        SlaDefinition {
            name: "Latency".into(),
            metric_name: "p95_latency_seconds".into(),
            threshold: config.sla_p95_latency_seconds,
            comparison: SlaComparison::Lt,
            window_minutes: 5,
            severity: SlaSeverity::Critical,
        },
        SlaDefinition {
            name: "Throughput".into(),
            metric_name: "docs_per_hour".into(),
            threshold: config.sla_throughput_docs_per_hour,
            comparison: SlaComparison::Gt,
            window_minutes: 15,
            severity: SlaSeverity::Warning,
        },
        SlaDefinition {
            name: "Error Rate".into(),
            metric_name: "error_rate_percent".into(),
            threshold: config.sla_error_rate_percent,
            comparison: SlaComparison::Lt,
            window_minutes: 5,
            severity: SlaSeverity::Critical,
        },
        SlaDefinition {
            name: "Queue Depth".into(),
            metric_name: "review_queue_depth".into(),
            threshold: config.sla_queue_depth_warning,
            comparison: SlaComparison::Lt,
            window_minutes: 5,
            severity: SlaSeverity::Warning,
        },
        SlaDefinition {
            name: "SLA Breach".into(),
            metric_name: "sla_breach_percent".into(),
            threshold: config.sla_breach_percent,
            comparison: SlaComparison::Lt,
            window_minutes: 60,
            severity: SlaSeverity::Critical,
        },
    ]
}

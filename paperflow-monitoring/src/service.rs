//! MonitoringService — records processing events, derives metrics, and
//! evaluates SLAs.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use paperflow_core::config::SlaConfig;
use paperflow_core::errors::MonitoringError;

use crate::sla::{default_slas, SlaBreach, SlaDefinition};
use crate::window::SlidingWindow;

/// Window span for latency/throughput derivation.
const WINDOW_SECONDS: u64 = 3600;

/// Point-in-time view of the derived metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub p95_latency_seconds: f64,
    pub docs_per_hour: f64,
    /// Cumulative over the service lifetime.
    pub error_rate_percent: f64,
    pub review_queue_depth: i64,
    pub sla_breach_percent: f64,
    pub total_processed: u64,
    pub total_errors: u64,
    pub reviews_recorded: u64,
}

struct MonitorState {
    window: SlidingWindow,
    processed_count: u64,
    error_count: u64,
    review_count: u64,
    queue_pending: i64,
    queue_in_review: i64,
    sla_total_checks: u64,
    sla_breach_count: u64,
}

/// Collects and evaluates processing metrics. Shared by value behind an
/// `Arc`; all interior state sits under one mutex.
pub struct MonitoringService {
    state: Mutex<MonitorState>,
    sla_definitions: Vec<SlaDefinition>,
    metrics_dir: PathBuf,
}

impl MonitoringService {
    pub fn new(sla_config: &SlaConfig, metrics_dir: &Path) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                window: SlidingWindow::new(Duration::from_secs(WINDOW_SECONDS)),
                processed_count: 0,
                error_count: 0,
                review_count: 0,
                queue_pending: 0,
                queue_in_review: 0,
                sla_total_checks: 0,
                sla_breach_count: 0,
            }),
            sla_definitions: default_slas(sla_config),
            metrics_dir: metrics_dir.to_path_buf(),
        }
    }

    /// Record one document-processing outcome.
    pub fn record_processing(
        &self,
        document_id: &str,
        duration_seconds: f64,
        confidence: f64,
        success: bool,
    ) {
        let mut state = self.state.lock().unwrap();
        state.window.record(duration_seconds);
        state.processed_count += 1;
        if !success {
            state.error_count += 1;
        }
        debug!(
            document = document_id,
            duration_seconds, confidence, success, "recorded processing event"
        );
    }

    /// Record a completed human review.
    pub fn record_review(&self, duration_seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.review_count += 1;
        debug!(duration_seconds, "recorded review completion");
    }

    /// Push the externally computed queue depth.
    pub fn update_queue_depth(&self, pending: i64, in_review: i64) {
        let mut state = self.state.lock().unwrap();
        state.queue_pending = pending;
        state.queue_in_review = in_review;
    }

    /// Current derived metrics.
    pub fn current_metrics(&self) -> MetricsSnapshot {
        let mut state = self.state.lock().unwrap();
        state.window.evict(std::time::Instant::now());
        snapshot(&state)
    }

    /// Evaluate every SLA rule against the current metrics, bumping the
    /// totals and breach counters, and return the breaches.
    pub fn check_slas(&self) -> Vec<SlaBreach> {
        let mut state = self.state.lock().unwrap();
        state.window.evict(std::time::Instant::now());
        let metrics = snapshot(&state);

        let mut breaches = Vec::new();
        for sla in &self.sla_definitions {
            state.sla_total_checks += 1;
            let value = metric_value(&metrics, &sla.metric_name);
            if sla.is_breached(value) {
                state.sla_breach_count += 1;
                warn!(
                    sla = %sla.name,
                    metric = %sla.metric_name,
                    value,
                    threshold = sla.threshold,
                    severity = ?sla.severity,
                    "SLA breach"
                );
                breaches.push(SlaBreach {
                    sla: sla.name.clone(),
                    metric: sla.metric_name.clone(),
                    threshold: sla.threshold,
                    current_value: value,
                    severity: sla.severity,
                    timestamp: Utc::now(),
                });
            }
        }
        breaches
    }

    /// Persist the current metrics and breach evaluation as a timestamped
    /// JSON file under the metrics dir.
    pub fn save_snapshot(&self) -> Result<PathBuf, MonitoringError> {
        let metrics = self.current_metrics();
        let breaches = self.check_slas();

        let body = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "metrics": metrics,
            "sla_breaches": breaches,
        });

        std::fs::create_dir_all(&self.metrics_dir)
            .map_err(|e| MonitoringError::SnapshotWriteFailed(e.to_string()))?;
        let path = self.metrics_dir.join(format!(
            "metrics_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        std::fs::write(&path, serde_json::to_vec_pretty(&body)?)
            .map_err(|e| MonitoringError::SnapshotWriteFailed(e.to_string()))?;

        debug!(path = %path.display(), "saved metrics snapshot");
        Ok(path)
    }

    pub fn sla_definitions(&self) -> &[SlaDefinition] {
        &self.sla_definitions
    }
}

fn snapshot(state: &MonitorState) -> MetricsSnapshot {
    let error_rate = if state.processed_count > 0 {
        state.error_count as f64 / state.processed_count as f64 * 100.0
    } else {
        0.0
    };
    let breach_percent = if state.sla_total_checks > 0 {
        state.sla_breach_count as f64 / state.sla_total_checks as f64 * 100.0
    } else {
        0.0
    };

    MetricsSnapshot {
        p95_latency_seconds: round2(state.window.p95()),
        docs_per_hour: round1(state.window.throughput_per_hour()),
        error_rate_percent: round2(error_rate),
        review_queue_depth: state.queue_pending + state.queue_in_review,
        sla_breach_percent: round2(breach_percent),
        total_processed: state.processed_count,
        total_errors: state.error_count,
        reviews_recorded: state.review_count,
    }
}

fn metric_value(metrics: &MetricsSnapshot, name: &str) -> f64 {
    match name {
        "p95_latency_seconds" => metrics.p95_latency_seconds,
        "docs_per_hour" => metrics.docs_per_hour,
        "error_rate_percent" => metrics.error_rate_percent,
        "review_queue_depth" => metrics.review_queue_depth as f64,
        "sla_breach_percent" => metrics.sla_breach_percent,
        _ => 0.0,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

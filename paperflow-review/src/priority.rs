//! Review priority: higher = more urgent.

use chrono::{DateTime, Utc};

/// Compute review priority from extraction confidence, SLA pressure, line
/// item count, and invoice value:
///
/// ```text
/// priority = (100 − confidence·100)·0.4
///          + max(0, (24 − hours_until_sla)/24)·100·0.3    (0 without deadline)
///          + min(line_items/100, 1)·100·0.2
///          + min(total/10_000, 1)·100·0.1
/// ```
///
/// Rounded to two decimals. A deadline already in the past counts as zero
/// hours remaining (maximum SLA pressure).
pub fn calculate_priority(
    confidence_avg: f64,
    sla_deadline: Option<DateTime<Utc>>,
    num_line_items: usize,
    total_amount: f64,
) -> f64 {
    calculate_priority_at(Utc::now(), confidence_avg, sla_deadline, num_line_items, total_amount)
}

/// Deterministic variant with an explicit "now" for tests.
pub fn calculate_priority_at(
    now: DateTime<Utc>,
    confidence_avg: f64,
    sla_deadline: Option<DateTime<Utc>>,
    num_line_items: usize,
    total_amount: f64,
) -> f64 {
    let conf_score = (100.0 - confidence_avg * 100.0) * 0.4;

    let sla_score = match sla_deadline {
        Some(deadline) => {
            let hours_left = ((deadline - now).num_milliseconds() as f64 / 3_600_000.0).max(0.0);
            ((24.0 - hours_left) / 24.0).max(0.0) * 100.0 * 0.3
        }
        None => 0.0,
    };

    let items_score = (num_line_items as f64 / 100.0).min(1.0) * 100.0 * 0.2;
    let value_score = (total_amount / 10_000.0).min(1.0) * 100.0 * 0.1;

    round2(conf_score + sla_score + items_score + value_score)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

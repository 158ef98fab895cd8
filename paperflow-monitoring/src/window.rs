//! Time-bounded sample window over (timestamp, duration) pairs.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window of processing durations. Samples older than the span are
/// evicted from the front on every record.
#[derive(Debug)]
pub struct SlidingWindow {
    span: Duration,
    samples: VecDeque<(Instant, f64)>,
}

impl SlidingWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            samples: VecDeque::new(),
        }
    }

    /// Record a duration now.
    pub fn record(&mut self, duration_seconds: f64) {
        self.record_at(Instant::now(), duration_seconds);
    }

    /// Record a duration with an explicit timestamp (replay, tests).
    pub fn record_at(&mut self, at: Instant, duration_seconds: f64) {
        self.samples.push_back((at, duration_seconds));
        self.evict(Instant::now());
    }

    /// Drop samples older than the window span.
    pub fn evict(&mut self, now: Instant) {
        while let Some(&(ts, _)) = self.samples.front() {
            if now.duration_since(ts) > self.span {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// P95 latency: the value at index ⌊N·0.95⌋ of the sorted durations,
    /// clamped to the last element. Zero for an empty window.
    pub fn p95(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().map(|&(_, d)| d).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((sorted.len() as f64) * 0.95) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Documents per hour, extrapolated from the window population.
    pub fn throughput_per_hour(&self) -> f64 {
        let span_hours = self.span.as_secs_f64() / 3600.0;
        if span_hours <= 0.0 {
            return 0.0;
        }
        self.samples.len() as f64 / span_hours
    }
}

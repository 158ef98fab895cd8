//! Worker and executor tuning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum steps executing simultaneously inside one DAG run.
    pub max_concurrent_tasks: usize,
    /// Hard per-task wall-clock limit (seconds).
    pub task_time_limit: u64,
    /// Soft per-task limit (seconds); the default step timeout.
    pub task_soft_time_limit: u64,
    pub max_retries: u32,
    /// Base for exponential retry backoff (seconds).
    pub retry_backoff_base: f64,
    /// Token-bucket rate for the extraction provider.
    pub extractor_rate_per_second: f64,
    pub extractor_burst: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            task_time_limit: 300,
            task_soft_time_limit: 270,
            max_retries: 3,
            retry_backoff_base: 10.0,
            extractor_rate_per_second: 10.0,
            extractor_burst: 1,
        }
    }
}

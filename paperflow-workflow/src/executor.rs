//! Workflow executor: validation-first, layered concurrency under a counted
//! semaphore, per-tag rate limiting, retries with jittered exponential
//! backoff, per-attempt timeouts, and dependency-failure propagation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, warn};

use paperflow_core::errors::WorkflowError;

use crate::dag::{WorkflowDag, WorkflowStep};
use crate::rate_limiter::TokenBucketRateLimiter;
use crate::step::{StepContext, StepResult, StepStatus, WorkflowResult};

/// Executes a [`WorkflowDag`] with concurrency control, rate limiting, and
/// retries.
///
/// At most `max_concurrency` step functions run simultaneously; waiting for
/// a rate-limit token happens inside the permit, waiting for the permit does
/// not count as executing.
pub struct WorkflowExecutor {
    semaphore: Arc<Semaphore>,
    rate_limiters: HashMap<String, Arc<TokenBucketRateLimiter>>,
    default_timeout_seconds: f64,
}

impl WorkflowExecutor {
    pub fn new(max_concurrency: usize, default_timeout_seconds: f64) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            rate_limiters: HashMap::new(),
            default_timeout_seconds,
        }
    }

    /// Register a rate limiter for a resource tag. Steps carrying the tag
    /// acquire one token per attempt.
    pub fn with_rate_limiter(
        mut self,
        resource_tag: &str,
        limiter: Arc<TokenBucketRateLimiter>,
    ) -> Self {
        self.rate_limiters.insert(resource_tag.to_string(), limiter);
        self
    }

    /// Execute all steps of the DAG respecting dependencies and concurrency.
    ///
    /// 1. Validate the DAG; any structural error fails before any step runs.
    /// 2. Compute execution layers.
    /// 3. Launch each layer's eligible steps concurrently; a step whose
    ///    dependency failed is recorded skipped without invoking its fn.
    /// 4. Aggregate per-step results into a [`WorkflowResult`].
    pub async fn execute(
        &self,
        dag: &WorkflowDag,
        context: Value,
    ) -> Result<WorkflowResult, WorkflowError> {
        let errors = dag.validate();
        if !errors.is_empty() {
            return Err(WorkflowError::InvalidDag {
                reasons: errors.join("; "),
            });
        }

        let t0 = Instant::now();
        let layers = dag.execution_layers()?;
        let context = Arc::new(context);

        let mut results: HashMap<String, StepResult> = HashMap::new();
        let mut step_outputs: HashMap<String, Value> = HashMap::new();

        for layer in layers {
            // Outputs visible to this layer: everything completed so far.
            let outputs_snapshot = Arc::new(step_outputs.clone());

            let mut pending = Vec::new();
            for step_id in &layer {
                let step = dag.step(step_id).expect("layer ids come from the dag");

                let dep_failed = step.depends_on.iter().any(|d| {
                    results
                        .get(d)
                        .map(|r| r.status == StepStatus::Failed)
                        .unwrap_or(false)
                });
                if dep_failed {
                    results.insert(
                        step_id.clone(),
                        StepResult::skipped(step_id, Some("Dependency failed".to_string())),
                    );
                    continue;
                }
                // A skipped dependency does not propagate; the branch runs.

                let ctx = StepContext::new(context.clone(), outputs_snapshot.clone());
                pending.push(self.execute_step(step, ctx));
            }

            // All eligible peers of this layer run concurrently; the next
            // layer starts only once every one of them is terminal.
            for result in futures::future::join_all(pending).await {
                if let (StepStatus::Completed, Some(output)) = (result.status, &result.output) {
                    step_outputs.insert(result.step_id.clone(), output.clone());
                }
                results.insert(result.step_id.clone(), result);
            }
        }

        let completed = results
            .values()
            .filter(|r| r.status == StepStatus::Completed)
            .count();
        let failed = results
            .values()
            .filter(|r| r.status == StepStatus::Failed)
            .count();
        let skipped = results
            .values()
            .filter(|r| r.status == StepStatus::Skipped)
            .count();

        Ok(WorkflowResult {
            success: failed == 0,
            steps: results,
            total_duration_seconds: round3(t0.elapsed().as_secs_f64()),
            completed_count: completed,
            failed_count: failed,
            skipped_count: skipped,
        })
    }

    /// Run one step: condition, permit, rate limit, then the retry loop.
    async fn execute_step(&self, step: &WorkflowStep, ctx: StepContext) -> StepResult {
        let step_id = step.id.clone();
        let t0 = Instant::now();

        if let Some(condition) = &step.condition {
            match condition(&ctx) {
                Ok(true) => {}
                Ok(false) => {
                    info!(step = %step_id, "step skipped (condition=false)");
                    return StepResult::skipped(&step_id, None);
                }
                Err(e) => {
                    let error = WorkflowError::ConditionFailed(e.to_string());
                    return StepResult {
                        step_id,
                        status: StepStatus::Failed,
                        output: None,
                        error: Some(error.to_string()),
                        duration_seconds: round3(t0.elapsed().as_secs_f64()),
                        retries_used: 0,
                    };
                }
            }
        }

        let permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return StepResult {
                    step_id,
                    status: StepStatus::Failed,
                    output: None,
                    error: Some(format!("concurrency semaphore closed: {e}")),
                    duration_seconds: round3(t0.elapsed().as_secs_f64()),
                    retries_used: 0,
                };
            }
        };

        let timeout_seconds = step.timeout_seconds.unwrap_or(self.default_timeout_seconds);
        let mut last_error = String::new();
        let mut retries_used = 0;

        for attempt in 0..=step.max_retries {
            // Token acquisition happens inside the permit, per attempt.
            if let Some(tag) = &step.resource_tag {
                if let Some(limiter) = self.rate_limiters.get(tag) {
                    limiter.acquire().await;
                }
            }

            let fut = (step.run)(ctx.clone());
            match timeout(Duration::from_secs_f64(timeout_seconds), fut).await {
                Ok(Ok(output)) => {
                    drop(permit);
                    info!(
                        step = %step_id,
                        elapsed = t0.elapsed().as_secs_f64(),
                        retries = attempt,
                        "step completed"
                    );
                    return StepResult {
                        step_id,
                        status: StepStatus::Completed,
                        output: Some(output),
                        error: None,
                        duration_seconds: round3(t0.elapsed().as_secs_f64()),
                        retries_used: attempt,
                    };
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    retries_used = attempt;
                    warn!(step = %step_id, attempt = attempt + 1, error = %last_error, "step failed");
                }
                Err(_) => {
                    last_error = WorkflowError::StepTimeout {
                        timeout: timeout_seconds,
                    }
                    .to_string();
                    retries_used = attempt;
                    warn!(step = %step_id, attempt = attempt + 1, "step timed out");
                }
            }

            if attempt < step.max_retries {
                let base_delay = step.retry_backoff_base * f64::powi(2.0, attempt as i32);
                let jitter = rand::thread_rng().gen_range(0.0..=(base_delay * 0.5));
                let delay = base_delay + jitter;
                info!(
                    step = %step_id,
                    delay,
                    backoff = base_delay,
                    "retrying after backoff"
                );
                sleep(Duration::from_secs_f64(delay)).await;
            }
        }

        drop(permit);
        error!(
            step = %step_id,
            attempts = step.max_retries + 1,
            error = %last_error,
            "step failed after all attempts"
        );
        StepResult {
            step_id,
            status: StepStatus::Failed,
            output: None,
            error: Some(last_error),
            duration_seconds: round3(t0.elapsed().as_secs_f64()),
            retries_used,
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

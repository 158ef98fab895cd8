//! Step-level types: status, per-step result, merged execution context, and
//! the aggregate workflow result.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use paperflow_core::errors::WorkflowError;

/// Lifecycle of a single step.
///
/// `Pending → (Skipped | Running)`, `Running → (Completed | Failed)`.
/// Retries re-enter `Running` within the same execution scope; they are not
/// a distinct state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Result of executing (or skipping) a single workflow step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub retries_used: u32,
}

impl StepResult {
    pub(crate) fn skipped(step_id: &str, error: Option<String>) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Skipped,
            output: None,
            error,
            duration_seconds: 0.0,
            retries_used: 0,
        }
    }
}

/// Aggregate result of a full workflow execution.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub success: bool,
    pub steps: HashMap<String, StepResult>,
    pub total_duration_seconds: f64,
    pub completed_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
}

impl WorkflowResult {
    /// Concatenated errors of all failed steps, oldest-insertion order not
    /// guaranteed (steps live in a map); callers needing determinism sort.
    pub fn failure_summary(&self) -> String {
        let mut parts: Vec<String> = self
            .steps
            .values()
            .filter(|r| r.status == StepStatus::Failed)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.step_id,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        parts.sort();
        parts.join("; ")
    }
}

/// The merged context passed to every step function: the caller-supplied
/// workflow context plus the outputs of all steps from earlier layers.
/// Peers in the same layer are never visible to each other.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub ctx: Arc<Value>,
    pub step_outputs: Arc<HashMap<String, Value>>,
}

impl StepContext {
    pub fn new(ctx: Arc<Value>, step_outputs: Arc<HashMap<String, Value>>) -> Self {
        Self { ctx, step_outputs }
    }

    /// Output of a previously completed step, if any.
    pub fn output(&self, step_id: &str) -> Option<&Value> {
        self.step_outputs.get(step_id)
    }

    /// A key from the caller-supplied workflow context.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.ctx.get(key)
    }
}

/// The capability a step carries: an async function from the merged context
/// to a JSON output.
pub type StepFn =
    Arc<dyn Fn(StepContext) -> BoxFuture<'static, Result<Value, WorkflowError>> + Send + Sync>;

/// Predicate deciding whether a step runs. `Ok(false)` skips the step; an
/// `Err` fails it with a `Condition evaluation failed` error.
pub type StepCondition = Arc<dyn Fn(&StepContext) -> Result<bool, WorkflowError> + Send + Sync>;

/// Wrap an async closure into a [`StepFn`].
pub fn step_fn<F, Fut>(f: F) -> StepFn
where
    F: Fn(StepContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value, WorkflowError>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

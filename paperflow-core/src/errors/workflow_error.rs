/// Workflow subsystem errors: DAG construction, validation, and execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    #[error("duplicate step id: {id}")]
    DuplicateStep { id: String },

    #[error("invalid DAG: {reasons}")]
    InvalidDag { reasons: String },

    #[error("Step timed out after {timeout}s")]
    StepTimeout { timeout: f64 },

    #[error("Condition evaluation failed: {0}")]
    ConditionFailed(String),

    #[error("step failed: {0}")]
    StepFailed(String),
}

use super::{MonitoringError, PipelineError, ReviewError, StorageError, WorkflowError};

/// Top-level error type for the Paperflow engine.
/// All subsystem errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum PaperflowError {
    #[error("workflow error: {0}")]
    WorkflowError(#[from] WorkflowError),

    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("review error: {0}")]
    ReviewError(#[from] ReviewError),

    #[error("pipeline error: {0}")]
    PipelineError(#[from] PipelineError),

    #[error("monitoring error: {0}")]
    MonitoringError(#[from] MonitoringError),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("broker error: {0}")]
    BrokerError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias.
pub type PaperflowResult<T> = Result<T, PaperflowError>;

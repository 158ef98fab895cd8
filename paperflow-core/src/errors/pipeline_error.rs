use super::StorageError;

/// Errors raised by the document pipeline: content hashing, dual-format
/// output, and worker orchestration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    #[error("output write failed for {path}: {reason}")]
    OutputWriteFailed { path: String, reason: String },

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("workflow failed: {0}")]
    WorkflowFailed(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

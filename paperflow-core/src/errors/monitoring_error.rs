/// Monitoring subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("snapshot write failed: {0}")]
    SnapshotWriteFailed(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

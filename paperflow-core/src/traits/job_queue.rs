//! The task-broker boundary.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::PaperflowResult;

/// Opaque "enqueue job" / "schedule periodic" interface provided by the
/// hosting process. The upload handler calls `enqueue_document` right after
/// inserting the documents row; the returned task id is stored on the row.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue_document(
        &self,
        document_id: &str,
        file_path: &Path,
        stored_name: &str,
    ) -> PaperflowResult<String>;

    /// Register a named periodic job (`release_expired_claims`,
    /// `update_queue_metrics`, …) at a fixed interval.
    async fn schedule_periodic(&self, job_name: &str, every: Duration) -> PaperflowResult<()>;
}

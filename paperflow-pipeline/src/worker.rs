//! DocumentWorker — drives one document through the pipeline, plus the
//! periodic maintenance jobs the broker schedules.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use paperflow_core::config::PaperflowConfig;
use paperflow_core::errors::{PaperflowResult, PipelineError};
use paperflow_core::models::{Document, DocumentStatus, ExtractionResult};
use paperflow_core::traits::{Extractor, JobQueue};
use paperflow_monitoring::MonitoringService;
use paperflow_review::ReviewQueueService;
use paperflow_storage::queries::document_ops;
use paperflow_storage::StorageEngine;
use paperflow_workflow::{
    CircuitBreaker, CircuitBreakerConfig, StepStatus, TokenBucketRateLimiter, WorkflowExecutor,
};

use crate::dag_builder::{build_document_dag, PipelineServices, EXTRACTOR_RESOURCE_TAG};
use crate::extract::ExtractionAdapter;
use crate::idempotency::IdempotencyStore;
use crate::output::OutputWriter;

/// Failure strings stored on a document are capped at this length.
const ERROR_MESSAGE_LIMIT: usize = 500;

/// Interval for the expired-claim release job (seconds).
pub const RELEASE_EXPIRED_INTERVAL_SECONDS: u64 = 300;
/// Interval for the queue-depth metrics job (seconds).
pub const UPDATE_METRICS_INTERVAL_SECONDS: u64 = 15;

/// Hosts one DAG execution at a time per document, bounded internally by the
/// configured step concurrency.
pub struct DocumentWorker {
    storage: Arc<StorageEngine>,
    services: PipelineServices,
    executor: WorkflowExecutor,
    config: PaperflowConfig,
}

impl DocumentWorker {
    pub fn new(
        storage: Arc<StorageEngine>,
        extractor: Arc<dyn Extractor>,
        monitoring: Arc<MonitoringService>,
        config: PaperflowConfig,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            EXTRACTOR_RESOURCE_TAG,
            CircuitBreakerConfig::default(),
        ));
        let limiter = Arc::new(TokenBucketRateLimiter::new(
            config.processing.extractor_rate_per_second,
            config.processing.extractor_burst,
        ));

        let review = Arc::new(
            ReviewQueueService::new(&storage, &config.sla, &config.review)
                .with_monitoring(monitoring.clone()),
        );
        let services = PipelineServices {
            adapter: Arc::new(ExtractionAdapter::new(extractor, breaker)),
            output: Arc::new(OutputWriter::new(
                &config.storage.parquet_dir,
                &config.storage.json_dir,
            )),
            review,
            idempotency: Arc::new(IdempotencyStore::new(storage.writer())),
            monitoring,
        };

        let executor = WorkflowExecutor::new(
            config.processing.max_concurrent_tasks,
            config.processing.task_soft_time_limit as f64,
        )
        .with_rate_limiter(EXTRACTOR_RESOURCE_TAG, limiter);

        Self {
            storage,
            services,
            executor,
            config,
        }
    }

    pub fn review(&self) -> Arc<ReviewQueueService> {
        self.services.review.clone()
    }

    pub fn monitoring(&self) -> Arc<MonitoringService> {
        self.services.monitoring.clone()
    }

    /// Insert the documents row for a fresh upload (the API boundary calls
    /// this before enqueueing the processing job).
    pub async fn register_document(&self, document: &Document) -> PaperflowResult<()> {
        let doc = document.clone();
        self.storage
            .writer()
            .with_conn(move |conn| document_ops::insert_document(conn, &doc))
            .await
            .map_err(paperflow_core::PaperflowError::from)
    }

    /// Process one document end to end.
    ///
    /// The idempotency check runs before the DAG is built: a cache hit marks
    /// the document `duplicate`, creates no review item, and returns the
    /// cached fields under the new document's identity. Otherwise the DAG
    /// runs; success marks the document `completed`, failure stores the
    /// concatenated step errors (truncated) and marks it `failed`.
    pub async fn process_document(
        &self,
        document_id: &str,
        file_path: &Path,
        stored_name: &str,
    ) -> PaperflowResult<ExtractionResult> {
        let t0 = Instant::now();
        info!(document = document_id, "processing document");

        self.set_status(document_id, DocumentStatus::Processing, None)
            .await?;

        match self.services.idempotency.get_cached(file_path).await {
            Ok(Some(cached)) => {
                info!(document = document_id, "duplicate upload, using cached result");
                self.set_status(document_id, DocumentStatus::Duplicate, None)
                    .await?;
                let mut result = cached;
                result.document_id = document_id.to_string();
                result.filename = stored_name.to_string();
                return Ok(result);
            }
            Ok(None) => {}
            Err(e) => {
                let message = truncate_error(&e.to_string());
                self.set_status(document_id, DocumentStatus::Failed, Some(&message))
                    .await?;
                return Err(e.into());
            }
        }

        let dag = build_document_dag(
            &self.services,
            &self.config.processing,
            document_id,
            file_path,
        )?;
        let context = serde_json::json!({
            "document_id": document_id,
            "file_path": file_path.display().to_string(),
            "stored_name": stored_name,
        });

        let run = self.executor.execute(&dag, context).await?;

        if run.success {
            self.set_status(document_id, DocumentStatus::Completed, None)
                .await?;
            info!(
                document = document_id,
                elapsed = run.total_duration_seconds,
                "document completed"
            );
            let extract_value = run
                .steps
                .get("extract")
                .and_then(|s| s.output.clone())
                .ok_or_else(|| {
                    PipelineError::ExtractionFailed("extract step produced no output".to_string())
                })?;
            let result: ExtractionResult = serde_json::from_value(extract_value)
                .map_err(PipelineError::SerializationError)?;
            Ok(result)
        } else {
            let summary = truncate_error(&run.failure_summary());
            error!(document = document_id, error = %summary, "document failed");
            // The record_metrics step already counted this document when
            // extraction succeeded; count it here only if it never fired,
            // so each document lands in the monitor exactly once.
            let already_recorded = run
                .steps
                .get("record_metrics")
                .map(|s| s.status == StepStatus::Completed)
                .unwrap_or(false);
            if !already_recorded {
                self.services.monitoring.record_processing(
                    document_id,
                    t0.elapsed().as_secs_f64(),
                    0.0,
                    false,
                );
            }
            self.set_status(document_id, DocumentStatus::Failed, Some(&summary))
                .await?;
            Err(PipelineError::WorkflowFailed(summary).into())
        }
    }

    async fn set_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        error_message: Option<&str>,
    ) -> PaperflowResult<()> {
        let id = document_id.to_string();
        let message = error_message.map(|s| s.to_string());
        let changed = self
            .storage
            .writer()
            .with_conn(move |conn| {
                document_ops::update_status(conn, &id, status, message.as_deref())
            })
            .await
            .map_err(paperflow_core::PaperflowError::from)?;
        if changed == 0 {
            warn!(document = document_id, "status update matched no document row");
        }
        Ok(())
    }
}

fn truncate_error(message: &str) -> String {
    message.chars().take(ERROR_MESSAGE_LIMIT).collect()
}

// ── Periodic jobs ───────────────────────────────────────────────────────────

/// Release claims that outlived the configured expiry. Scheduled every
/// five minutes by the broker.
pub async fn release_expired_claims(review: &ReviewQueueService) -> PaperflowResult<usize> {
    let released = review.release_expired_claims().await?;
    Ok(released)
}

/// Refresh the monitoring queue-depth gauges from the database. Scheduled
/// every fifteen seconds by the broker.
pub async fn update_queue_metrics(
    review: &ReviewQueueService,
    monitoring: &MonitoringService,
) -> PaperflowResult<()> {
    let (pending, in_review) = review.queue_depth().await?;
    monitoring.update_queue_depth(pending, in_review);
    Ok(())
}

/// Register both maintenance jobs with the host scheduler.
pub async fn register_periodic_jobs(queue: &dyn JobQueue) -> PaperflowResult<()> {
    queue
        .schedule_periodic(
            "release_expired_claims",
            Duration::from_secs(RELEASE_EXPIRED_INTERVAL_SECONDS),
        )
        .await?;
    queue
        .schedule_periodic(
            "update_queue_metrics",
            Duration::from_secs(UPDATE_METRICS_INTERVAL_SECONDS),
        )
        .await?;
    Ok(())
}

//! The standard per-document processing DAG:
//!
//! ```text
//! extract ──► save_parquet ──► create_review
//!        \                     ^
//!         ── save_json ────────┘
//!        \
//!         ── record_metrics
//! ```
//!
//! `save_parquet` and `save_json` run in the same layer; `create_review`
//! fans in on both; `record_metrics` runs once extraction has produced an
//! output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use paperflow_core::config::ProcessingConfig;
use paperflow_core::errors::WorkflowError;
use paperflow_core::models::ExtractionResult;
use paperflow_monitoring::MonitoringService;
use paperflow_review::ReviewQueueService;
use paperflow_workflow::{step_fn, StepContext, StepOptions, WorkflowDag};

use crate::extract::ExtractionAdapter;
use crate::idempotency::IdempotencyStore;
use crate::output::OutputWriter;

/// Resource tag shared by the extract step and its registered rate limiter.
pub const EXTRACTOR_RESOURCE_TAG: &str = "extractor";

/// Services a DAG run needs; cloned into the step closures.
#[derive(Clone)]
pub struct PipelineServices {
    pub adapter: Arc<ExtractionAdapter>,
    pub output: Arc<OutputWriter>,
    pub review: Arc<ReviewQueueService>,
    pub idempotency: Arc<IdempotencyStore>,
    pub monitoring: Arc<MonitoringService>,
}

/// Build the document-processing DAG for one upload.
pub fn build_document_dag(
    services: &PipelineServices,
    processing: &ProcessingConfig,
    document_id: &str,
    file_path: &Path,
) -> Result<WorkflowDag, WorkflowError> {
    let mut dag = WorkflowDag::new();

    let adapter = services.adapter.clone();
    let doc_id: String = document_id.to_string();
    let path: PathBuf = file_path.to_path_buf();
    dag.add_step(
        "extract",
        step_fn(move |_ctx| {
            let adapter = adapter.clone();
            let doc_id = doc_id.clone();
            let path = path.clone();
            async move {
                let result = adapter
                    .extract_file(&path, &doc_id)
                    .await
                    .map_err(|e| WorkflowError::StepFailed(e.to_string()))?;
                serde_json::to_value(&result).map_err(|e| WorkflowError::StepFailed(e.to_string()))
            }
        }),
        StepOptions {
            max_retries: 3,
            retry_backoff_base: processing.retry_backoff_base,
            resource_tag: Some(EXTRACTOR_RESOURCE_TAG.to_string()),
            timeout_seconds: Some(120.0),
            ..StepOptions::default()
        },
    )?;

    let output = services.output.clone();
    dag.add_step(
        "save_parquet",
        step_fn(move |ctx| {
            let output = output.clone();
            async move {
                let result = extract_output(&ctx)?;
                let path = output
                    .write_parquet(&result)
                    .map_err(|e| WorkflowError::StepFailed(e.to_string()))?;
                Ok(json!(path.display().to_string()))
            }
        }),
        StepOptions {
            depends_on: vec!["extract".to_string()],
            max_retries: 2,
            retry_backoff_base: processing.retry_backoff_base,
            timeout_seconds: Some(30.0),
            ..StepOptions::default()
        },
    )?;

    let output = services.output.clone();
    dag.add_step(
        "save_json",
        step_fn(move |ctx| {
            let output = output.clone();
            async move {
                let result = extract_output(&ctx)?;
                let path = output
                    .write_json(&result)
                    .map_err(|e| WorkflowError::StepFailed(e.to_string()))?;
                Ok(json!(path.display().to_string()))
            }
        }),
        StepOptions {
            depends_on: vec!["extract".to_string()],
            max_retries: 1,
            retry_backoff_base: processing.retry_backoff_base,
            timeout_seconds: Some(30.0),
            ..StepOptions::default()
        },
    )?;

    let review = services.review.clone();
    let idempotency = services.idempotency.clone();
    dag.add_step(
        "create_review",
        step_fn(move |ctx| {
            let review = review.clone();
            let idempotency = idempotency.clone();
            async move {
                let result = extract_output(&ctx)?;
                review
                    .materialize(&result)
                    .await
                    .map_err(|e| WorkflowError::StepFailed(e.to_string()))?;
                // Both outputs are durable at this fan-in point; record the
                // bytes as processed.
                idempotency
                    .cache_result(&result)
                    .await
                    .map_err(|e| WorkflowError::StepFailed(e.to_string()))?;
                Ok(json!(result.document_id))
            }
        }),
        StepOptions {
            depends_on: vec!["save_parquet".to_string(), "save_json".to_string()],
            max_retries: 2,
            retry_backoff_base: processing.retry_backoff_base,
            timeout_seconds: Some(30.0),
            ..StepOptions::default()
        },
    )?;

    let monitoring = services.monitoring.clone();
    let doc_id = document_id.to_string();
    dag.add_step(
        "record_metrics",
        step_fn(move |ctx| {
            let monitoring = monitoring.clone();
            let doc_id = doc_id.clone();
            async move {
                let result = extract_output(&ctx)?;
                monitoring.record_processing(
                    &doc_id,
                    result.processing_time_seconds,
                    result.overall_confidence,
                    true,
                );
                Ok(json!(null))
            }
        }),
        StepOptions {
            depends_on: vec!["extract".to_string()],
            max_retries: 1,
            retry_backoff_base: processing.retry_backoff_base,
            condition: Some(Arc::new(|ctx: &StepContext| {
                Ok(ctx.output("extract").is_some())
            })),
            ..StepOptions::default()
        },
    )?;

    Ok(dag)
}

fn extract_output(ctx: &StepContext) -> Result<ExtractionResult, WorkflowError> {
    let value = ctx
        .output("extract")
        .ok_or_else(|| WorkflowError::StepFailed("extract output missing".to_string()))?;
    serde_json::from_value(value.clone()).map_err(|e| WorkflowError::StepFailed(e.to_string()))
}

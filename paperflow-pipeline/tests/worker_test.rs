//! End-to-end worker scenarios: full run, duplicate short-circuit, failure
//! accounting, and lock survival across reprocessing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use paperflow_core::config::PaperflowConfig;
use paperflow_core::errors::{PaperflowError, PaperflowResult};
use paperflow_core::models::*;
use paperflow_core::traits::{Extractor, JobQueue};
use paperflow_monitoring::MonitoringService;
use paperflow_pipeline::worker::{
    register_periodic_jobs, release_expired_claims, update_queue_metrics,
};
use paperflow_pipeline::DocumentWorker;
use paperflow_storage::queries::cache_ops;
use paperflow_storage::StorageEngine;

// ── Test doubles ────────────────────────────────────────────────────────────

struct MockExtractor {
    vendor: Mutex<String>,
    failing: AtomicBool,
    calls: AtomicU32,
}

impl MockExtractor {
    fn new(vendor: &str) -> Arc<Self> {
        Arc::new(Self {
            vendor: Mutex::new(vendor.to_string()),
            failing: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        })
    }

    fn set_vendor(&self, vendor: &str) {
        *self.vendor.lock().unwrap() = vendor.to_string();
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self, _bytes: &[u8], _mime: &str) -> PaperflowResult<StructuredInvoice> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaperflowError::ExtractionFailed(
                "provider unavailable".to_string(),
            ));
        }
        Ok(StructuredInvoice {
            vendor: ConfidentField::new(self.vendor.lock().unwrap().clone(), 0.92),
            invoice_number: ConfidentField::new("INV-7".to_string(), 0.93),
            date: ConfidentField::new("2026-07-01".to_string(), 0.90),
            due_date: ConfidentField::absent(),
            subtotal: ConfidentField::new(100.0, 0.85),
            tax_rate: ConfidentField::new(7.7, 0.80),
            tax_amount: ConfidentField::new(7.7, 0.82),
            total: ConfidentField::new(107.7, 0.95),
            currency: ConfidentField::new("CHF".to_string(), 0.88),
            line_items: vec![LineItem {
                item: "widget".to_string(),
                quantity: 1,
                unit_price: 100.0,
                total: 100.0,
            }],
            line_items_confidence: Some(0.9),
        })
    }
}

struct RecordingQueue {
    scheduled: Mutex<Vec<(String, Duration)>>,
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue_document(
        &self,
        _document_id: &str,
        _file_path: &Path,
        _stored_name: &str,
    ) -> PaperflowResult<String> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn schedule_periodic(&self, job_name: &str, every: Duration) -> PaperflowResult<()> {
        self.scheduled
            .lock()
            .unwrap()
            .push((job_name.to_string(), every));
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

struct Rig {
    worker: DocumentWorker,
    storage: Arc<StorageEngine>,
    extractor: Arc<MockExtractor>,
    upload_dir: tempfile::TempDir,
}

fn rig(vendor: &str) -> Rig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let mut config = PaperflowConfig::default();
    config.storage.parquet_dir = dir.path().join("parquet");
    config.storage.json_dir = dir.path().join("json");
    config.storage.metrics_dir = dir.path().join("metrics");
    config.processing.retry_backoff_base = 0.01;
    config.processing.extractor_rate_per_second = 1000.0;
    config.processing.extractor_burst = 100;

    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    let monitoring = Arc::new(MonitoringService::new(
        &config.sla,
        &config.storage.metrics_dir,
    ));
    let extractor = MockExtractor::new(vendor);
    let worker = DocumentWorker::new(
        storage.clone(),
        extractor.clone(),
        monitoring,
        config,
    );

    Rig {
        worker,
        storage,
        extractor,
        upload_dir: dir,
    }
}

impl Rig {
    async fn upload(&self, document_id: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = self.upload_dir.path().join(format!("{document_id}.pdf"));
        std::fs::write(&path, bytes).unwrap();
        let now = Utc::now();
        self.worker
            .register_document(&Document {
                id: document_id.to_string(),
                stored_name: format!("{document_id}.pdf"),
                original_name: "invoice.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                status: DocumentStatus::Queued,
                task_id: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        path
    }

    async fn document_status(&self, id: &str) -> Document {
        let id = id.to_string();
        self.storage
            .writer()
            .with_conn(move |conn| {
                paperflow_storage::queries::document_ops::get_document(conn, &id)
            })
            .await
            .unwrap()
            .unwrap()
    }

    async fn cache_rows(&self) -> i64 {
        self.storage
            .writer()
            .with_conn(cache_ops::count_rows)
            .await
            .unwrap()
    }
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_completes_document_and_creates_review() {
    let rig = rig("Acme");
    let path = rig.upload("doc-1", b"invoice bytes A").await;

    let result = rig
        .worker
        .process_document("doc-1", &path, "doc-1.pdf")
        .await
        .unwrap();

    assert_eq!(result.document_id, "doc-1");
    assert_eq!(result.invoice_data.vendor.as_deref(), Some("Acme"));
    assert!(result.overall_confidence > 0.8);
    assert_eq!(result.content_hash.as_deref().map(|h| h.len()), Some(64));

    let doc = rig.document_status("doc-1").await;
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(doc.error_message.is_none());

    let page = rig
        .worker
        .review()
        .queue(&QueueFilter::default(), QueueSort::Priority, 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].document_id, "doc-1");
    assert!(!page.items[0].fields.is_empty());

    assert_eq!(rig.cache_rows().await, 1);
    assert_eq!(rig.worker.monitoring().current_metrics().total_processed, 1);
}

#[tokio::test]
async fn duplicate_upload_short_circuits_to_cache() {
    let rig = rig("Acme");
    let bytes = b"identical invoice bytes";

    let path1 = rig.upload("doc-1", bytes).await;
    rig.worker
        .process_document("doc-1", &path1, "doc-1.pdf")
        .await
        .unwrap();
    let calls_after_first = rig.extractor.calls.load(Ordering::SeqCst);

    let path2 = rig.upload("doc-2", bytes).await;
    let result = rig
        .worker
        .process_document("doc-2", &path2, "doc-2.pdf")
        .await
        .unwrap();

    // The DTO reflects the new upload, the fields come from the cache.
    assert_eq!(result.document_id, "doc-2");
    assert_eq!(result.filename, "doc-2.pdf");
    assert_eq!(result.invoice_data.vendor.as_deref(), Some("Acme"));

    let doc2 = rig.document_status("doc-2").await;
    assert_eq!(doc2.status, DocumentStatus::Duplicate);

    // No second review item, no second cache row, no second provider call.
    let page = rig
        .worker
        .review()
        .queue(&QueueFilter::default(), QueueSort::Priority, 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].document_id, "doc-1");
    assert_eq!(rig.cache_rows().await, 1);
    assert_eq!(rig.extractor.calls.load(Ordering::SeqCst), calls_after_first);
}

#[tokio::test]
async fn failing_extractor_marks_document_failed_with_truncated_error() {
    let rig = rig("Acme");
    rig.extractor.failing.store(true, Ordering::SeqCst);
    let path = rig.upload("doc-1", b"some bytes").await;

    let err = rig
        .worker
        .process_document("doc-1", &path, "doc-1.pdf")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("workflow failed"));

    let doc = rig.document_status("doc-1").await;
    assert_eq!(doc.status, DocumentStatus::Failed);
    let message = doc.error_message.unwrap();
    assert!(message.contains("extract"));
    assert!(message.chars().count() <= 500);

    // All four extract attempts hit the provider, downstream steps never ran.
    assert_eq!(rig.extractor.calls.load(Ordering::SeqCst), 4);
    let page = rig
        .worker
        .review()
        .queue(&QueueFilter::default(), QueueSort::Priority, 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 0);

    let metrics = rig.worker.monitoring().current_metrics();
    assert_eq!(metrics.total_errors, 1);
}

#[tokio::test]
async fn locked_correction_survives_reprocessing_new_bytes() {
    let rig = rig("Acme");
    let path = rig.upload("doc-1", b"first scan").await;
    rig.worker
        .process_document("doc-1", &path, "doc-1.pdf")
        .await
        .unwrap();

    let review = rig.worker.review();
    let page = review
        .queue(&QueueFilter::default(), QueueSort::Priority, 10, 0)
        .await
        .unwrap();
    let item_id = page.items[0].id.clone();

    review.claim(&item_id, "alice").await.unwrap();
    review
        .submit(
            &item_id,
            &ReviewSubmission {
                action: ReviewAction::Correct,
                corrections: BTreeMap::from([("vendor".to_string(), "X".to_string())]),
                reason: None,
            },
            "alice",
        )
        .await
        .unwrap();

    // Completing the review feeds the review-duration metric.
    assert_eq!(rig.worker.monitoring().current_metrics().reviews_recorded, 1);

    // A rescan of the same document produces different bytes and a new
    // vendor reading.
    rig.extractor.set_vendor("Y");
    std::fs::write(&path, b"second scan, better quality").unwrap();
    rig.worker
        .process_document("doc-1", &path, "doc-1.pdf")
        .await
        .unwrap();

    let item = review.get_item(&item_id).await.unwrap().unwrap();
    let vendor = item.fields.iter().find(|f| f.field_name == "vendor").unwrap();
    assert_eq!(vendor.value.as_deref(), Some("X"), "lock must survive");
    assert!(vendor.locked);

    // Unlocked fields were refreshed from the new extraction.
    let invoice_number = item
        .fields
        .iter()
        .find(|f| f.field_name == "invoice_number")
        .unwrap();
    assert!(!invoice_number.locked);
}

#[tokio::test]
async fn failure_after_successful_extract_is_counted_once() {
    let rig = rig("Acme");
    // Block the parquet partition dir with a plain file so save_parquet
    // fails while extract (and record_metrics) succeed.
    let parquet_dir = rig.upload_dir.path().join("parquet");
    std::fs::write(&parquet_dir, b"not a directory").unwrap();

    let path = rig.upload("doc-1", b"bytes").await;
    let err = rig
        .worker
        .process_document("doc-1", &path, "doc-1.pdf")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("save_parquet"));

    let doc = rig.document_status("doc-1").await;
    assert_eq!(doc.status, DocumentStatus::Failed);

    // record_metrics fired in its layer; the worker must not add a second
    // event for the same document.
    let metrics = rig.worker.monitoring().current_metrics();
    assert_eq!(metrics.total_processed, 1);
    assert_eq!(metrics.total_errors, 0);

    // The fan-in never ran: no review item was created.
    let page = rig
        .worker
        .review()
        .queue(&QueueFilter::default(), QueueSort::Priority, 10, 0)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

// ── Periodic jobs ───────────────────────────────────────────────────────────

#[tokio::test]
async fn periodic_jobs_update_metrics_and_release_claims() {
    let rig = rig("Acme");
    let path = rig.upload("doc-1", b"bytes").await;
    rig.worker
        .process_document("doc-1", &path, "doc-1.pdf")
        .await
        .unwrap();

    let review = rig.worker.review();
    let monitoring = rig.worker.monitoring();

    update_queue_metrics(&review, &monitoring).await.unwrap();
    assert_eq!(monitoring.current_metrics().review_queue_depth, 1);

    // Nothing claimed yet, so nothing to release.
    assert_eq!(release_expired_claims(&review).await.unwrap(), 0);
}

#[tokio::test]
async fn periodic_jobs_register_with_the_scheduler() {
    let queue = RecordingQueue {
        scheduled: Mutex::new(vec![]),
    };
    register_periodic_jobs(&queue).await.unwrap();

    let scheduled = queue.scheduled.lock().unwrap();
    assert_eq!(scheduled.len(), 2);
    assert_eq!(
        scheduled[0],
        ("release_expired_claims".to_string(), Duration::from_secs(300))
    );
    assert_eq!(
        scheduled[1],
        ("update_queue_metrics".to_string(), Duration::from_secs(15))
    );
}

//! ReviewQueueService — all review-queue mutations and reads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use paperflow_core::config::{ReviewConfig, SlaConfig};
use paperflow_core::errors::ReviewError;
use paperflow_core::models::{
    AuditAction, AuditEntry, ExtractedField, ExtractionResult, QueueFilter, QueuePage, QueueSort,
    QueueStats, ReviewAction, ReviewItem, ReviewStatus, ReviewSubmission,
};
use paperflow_monitoring::MonitoringService;
use paperflow_storage::pool::{ReadPool, WriteConnection};
use paperflow_storage::queries::{audit_ops, field_ops, review_ops};
use paperflow_storage::StorageEngine;

use crate::priority::calculate_priority;

/// Service managing the human-review queue.
///
/// Holds the write connection for mutations and the read pool for listing
/// and stats. Auto-assignment tie-breaking uses a shared atomic counter so
/// equals receive work round-robin.
pub struct ReviewQueueService {
    writer: Arc<WriteConnection>,
    readers: Arc<ReadPool>,
    roster: Vec<String>,
    sla_default: Duration,
    claim_expiry: Duration,
    assign_counter: AtomicUsize,
    monitoring: Option<Arc<MonitoringService>>,
}

impl ReviewQueueService {
    pub fn new(storage: &StorageEngine, sla: &SlaConfig, review: &ReviewConfig) -> Self {
        Self {
            writer: storage.writer(),
            readers: storage.readers(),
            roster: review.reviewer_roster.clone(),
            sla_default: Duration::hours(sla.sla_default_hours),
            claim_expiry: Duration::minutes(sla.claim_expiry_minutes),
            assign_counter: AtomicUsize::new(0),
            monitoring: None,
        }
    }

    /// Attach the monitor so completed reviews feed the review-duration
    /// metric.
    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringService>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    // ── Materialization ─────────────────────────────────────────────────

    /// Create or refresh the review item for a freshly extracted document.
    ///
    /// Upserts by document id (an existing item keeps its identity, status
    /// and timestamps; only priority and SLA deadline are refreshed),
    /// replaces all non-locked fields with the new extraction, and never
    /// touches locked fields. Runs in a single transaction, then attempts
    /// auto-assignment.
    pub async fn materialize(&self, result: &ExtractionResult) -> Result<ReviewItem, ReviewError> {
        let now = Utc::now();
        let item_priority = calculate_priority(
            result.overall_confidence,
            None,
            result.invoice_data.line_items.len(),
            result.invoice_data.total.unwrap_or(0.0),
        );

        let candidate = ReviewItem {
            id: Uuid::new_v4().to_string(),
            document_id: result.document_id.clone(),
            filename: result.filename.clone(),
            status: ReviewStatus::Pending,
            priority: item_priority,
            sla_deadline: None,
            assigned_to: None,
            created_at: now,
            claimed_at: None,
            completed_at: None,
            fields: vec![],
        };

        let fields: Vec<(String, Option<String>, f64)> = result
            .field_confidences
            .iter()
            .map(|fc| {
                (
                    fc.field_name.clone(),
                    fc.value.as_ref().map(encode_field_value),
                    fc.confidence,
                )
            })
            .collect();

        let document_id = result.document_id.clone();
        let item_id = self
            .writer
            .with_txn(move |conn| {
                review_ops::upsert_item(conn, &candidate)?;
                // The upsert may have kept a pre-existing row; resolve the
                // real item id before touching fields.
                let item = review_ops::get_item_by_document(conn, &document_id)?.ok_or(
                    paperflow_core::errors::StorageError::NotFound {
                        entity: "review_item",
                        id: document_id.clone(),
                    },
                )?;

                field_ops::delete_unlocked_fields(conn, &item.id)?;
                let locked = field_ops::locked_field_names(conn, &item.id)?;
                for (field_name, value, confidence) in fields {
                    if locked.contains(&field_name) {
                        continue;
                    }
                    field_ops::insert_field(
                        conn,
                        &ExtractedField {
                            id: Uuid::new_v4().to_string(),
                            review_item_id: item.id.clone(),
                            field_name,
                            value,
                            confidence,
                            manually_corrected: false,
                            corrected_at: None,
                            corrected_by: None,
                            locked: false,
                        },
                    )?;
                }
                Ok(item.id)
            })
            .await?;

        info!(item = %item_id, document = %result.document_id, priority = item_priority,
              "materialized review item");

        self.auto_assign(&item_id).await?;

        self.get_item(&item_id)
            .await?
            .ok_or(ReviewError::ItemNotFound { id: item_id })
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Fetch one item with its extracted fields.
    pub async fn get_item(&self, item_id: &str) -> Result<Option<ReviewItem>, ReviewError> {
        let item_id = item_id.to_string();
        let item = self
            .writer
            .with_conn(move |conn| {
                let Some(mut item) = review_ops::get_item(conn, &item_id)? else {
                    return Ok(None);
                };
                item.fields = field_ops::fields_for_item(conn, &item.id)?;
                Ok(Some(item))
            })
            .await?;
        Ok(item)
    }

    /// Paginated queue listing. Fields for the whole page are fetched in a
    /// single batch query.
    pub async fn queue(
        &self,
        filter: &QueueFilter,
        sort: QueueSort,
        limit: i64,
        offset: i64,
    ) -> Result<QueuePage, ReviewError> {
        let page = self.readers.with_conn(|conn| {
            let total = review_ops::count_matching(conn, filter)?;
            let mut items = review_ops::query_page(conn, filter, sort, limit, offset)?;

            let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
            let mut grouped = field_ops::fields_for_items(conn, &ids)?;
            for item in &mut items {
                item.fields = grouped.remove(&item.id).unwrap_or_default();
            }

            Ok(QueuePage {
                items,
                total,
                limit,
                offset,
            })
        })?;
        Ok(page)
    }

    /// Audit trail for one item.
    pub async fn audit_log(&self, item_id: &str) -> Result<Vec<AuditEntry>, ReviewError> {
        let entries = self
            .readers
            .with_conn(|conn| audit_ops::entries_for_item(conn, item_id))?;
        Ok(entries)
    }

    // ── Claim ───────────────────────────────────────────────────────────

    /// Atomically claim a pending item. The SLA clock starts here: the
    /// deadline is `now + sla_default`, not anchored at creation. A claim
    /// on anything but a pending item returns [`ReviewError::ClaimConflict`].
    pub async fn claim(
        &self,
        item_id: &str,
        reviewer_id: &str,
    ) -> Result<ReviewItem, ReviewError> {
        let now = Utc::now();
        let deadline = now + self.sla_default;
        let id = item_id.to_string();
        let reviewer = reviewer_id.to_string();

        self.writer
            .with_txn(move |conn| {
                let changed = review_ops::claim_item(conn, &id, &reviewer, now, deadline)?;
                if changed == 0 {
                    return Ok(Err(ReviewError::ClaimConflict { item_id: id }));
                }
                audit_ops::insert_entry(
                    conn,
                    &id,
                    AuditAction::StartReview,
                    None,
                    None,
                    None,
                    Some(reviewer.as_str()),
                    now,
                )?;
                Ok(Ok(()))
            })
            .await??;

        self.get_item(item_id).await?.ok_or(ReviewError::ItemNotFound {
            id: item_id.to_string(),
        })
    }

    // ── Submit ──────────────────────────────────────────────────────────

    /// Submit a review decision. Status, completion time, corrections, and
    /// audit entries are written in one transaction. Corrections against
    /// locked fields are skipped silently (and logged); every applied
    /// correction locks its field permanently.
    pub async fn submit(
        &self,
        item_id: &str,
        submission: &ReviewSubmission,
        reviewer_id: &str,
    ) -> Result<ReviewItem, ReviewError> {
        let now = Utc::now();
        let new_status = submission.action.target_status();
        let id = item_id.to_string();
        let reviewer = reviewer_id.to_string();
        let submission = submission.clone();

        let first_completion = self
            .writer
            .with_txn(move |conn| {
                let Some(existing) = review_ops::get_item(conn, &id)? else {
                    return Ok(Err(ReviewError::ItemNotFound { id }));
                };
                // Terminal states absorb: only a repeat of the same
                // decision is accepted (it refreshes completed_at).
                if existing.status.is_terminal() && existing.status != new_status {
                    return Ok(Err(ReviewError::ClaimConflict { item_id: id }));
                }
                let first_completion = !existing.status.is_terminal();
                review_ops::complete_item(conn, &id, new_status, now)?;

                for (field_name, new_value) in &submission.corrections {
                    let Some(field) = field_ops::get_field(conn, &id, field_name)? else {
                        continue;
                    };
                    if field.locked {
                        info!(item = %id, field = %field_name, "skipping locked field");
                        continue;
                    }

                    let old_value = field.value.clone();
                    field_ops::apply_correction(conn, &field.id, new_value, &reviewer, now)?;
                    audit_ops::insert_entry(
                        conn,
                        &id,
                        AuditAction::Correction,
                        Some(field_name.as_str()),
                        old_value.as_deref(),
                        Some(new_value.as_str()),
                        Some(reviewer.as_str()),
                        now,
                    )?;
                }

                match submission.action {
                    ReviewAction::Reject => {
                        if let Some(reason) = &submission.reason {
                            audit_ops::insert_entry(
                                conn,
                                &id,
                                AuditAction::Rejection,
                                None,
                                None,
                                Some(reason.as_str()),
                                Some(reviewer.as_str()),
                                now,
                            )?;
                        }
                    }
                    ReviewAction::Approve => {
                        audit_ops::insert_entry(
                            conn,
                            &id,
                            AuditAction::Approval,
                            None,
                            None,
                            None,
                            Some(reviewer.as_str()),
                            now,
                        )?;
                    }
                    ReviewAction::Correct => {}
                }

                Ok(Ok(first_completion))
            })
            .await??;

        let item = self.get_item(item_id).await?.ok_or(ReviewError::ItemNotFound {
            id: item_id.to_string(),
        })?;

        // Feed the review-duration metric once per item, on its first
        // transition into a terminal state.
        if first_completion {
            if let (Some(monitoring), Some(claimed_at), Some(completed_at)) =
                (&self.monitoring, item.claimed_at, item.completed_at)
            {
                let duration = (completed_at - claimed_at).num_milliseconds() as f64 / 1000.0;
                monitoring.record_review(duration.max(0.0));
            }
        }

        Ok(item)
    }

    // ── Auto-assign ─────────────────────────────────────────────────────

    /// Assign the least-loaded reviewer from the roster to a still-pending
    /// item. Load = items in pending or in_review per reviewer. Ties are
    /// broken round-robin through the shared counter. Returns the chosen
    /// reviewer, or `None` when the roster is empty or the item is no
    /// longer pending.
    pub async fn auto_assign(&self, item_id: &str) -> Result<Option<String>, ReviewError> {
        if self.roster.is_empty() {
            return Ok(None);
        }

        let load = self
            .writer
            .with_conn(review_ops::active_load_by_reviewer)
            .await?;

        let min_load = self
            .roster
            .iter()
            .map(|r| load.get(r).copied().unwrap_or(0))
            .min()
            .unwrap_or(0);
        let tied: Vec<&String> = self
            .roster
            .iter()
            .filter(|r| load.get(*r).copied().unwrap_or(0) == min_load)
            .collect();
        let idx = self.assign_counter.fetch_add(1, Ordering::Relaxed) % tied.len();
        let reviewer = tied[idx].clone();

        let id = item_id.to_string();
        let chosen = reviewer.clone();
        let assigned = self
            .writer
            .with_txn(move |conn| {
                let changed = review_ops::assign_if_pending(conn, &id, &chosen)?;
                if changed > 0 {
                    audit_ops::insert_entry(
                        conn,
                        &id,
                        AuditAction::AutoAssign,
                        None,
                        None,
                        Some(chosen.as_str()),
                        Some("system"),
                        Utc::now(),
                    )?;
                }
                Ok(changed > 0)
            })
            .await?;

        if assigned {
            info!(item = %item_id, reviewer = %reviewer, "auto-assigned");
            Ok(Some(reviewer))
        } else {
            Ok(None)
        }
    }

    // ── Expiry ──────────────────────────────────────────────────────────

    /// Release every claim older than the configured expiry back to
    /// pending, clearing assignment and the SLA clock. Returns the count
    /// released.
    pub async fn release_expired_claims(&self) -> Result<usize, ReviewError> {
        let cutoff = Utc::now() - self.claim_expiry;
        let released = self
            .writer
            .with_conn(move |conn| review_ops::release_expired(conn, cutoff))
            .await?;
        if released > 0 {
            warn!(released, "released expired review claims");
        }
        Ok(released)
    }

    // ── Stats ───────────────────────────────────────────────────────────

    /// Dashboard statistics, computed on demand.
    pub async fn stats(&self) -> Result<QueueStats, ReviewError> {
        let stats = self.readers.with_conn(|conn| {
            let (pending, in_review) = review_ops::queue_depth(conn)?;

            let midnight = Utc::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is a valid time")
                .and_utc();
            let reviewed_today = review_ops::completed_since(conn, midnight)?;

            let avg_seconds = review_ops::avg_review_seconds(conn)?;

            let (on_time, total_completed) = review_ops::sla_completion_counts(conn)?;
            let compliance = if total_completed > 0 {
                on_time as f64 / total_completed as f64 * 100.0
            } else {
                100.0
            };

            Ok(QueueStats {
                queue_depth: pending + in_review,
                items_reviewed_today: reviewed_today,
                avg_review_time_seconds: round1(avg_seconds),
                sla_compliance_percent: round1(compliance),
            })
        })?;
        Ok(stats)
    }

    /// Current (pending, in_review) counts for the queue-depth metric job.
    pub async fn queue_depth(&self) -> Result<(i64, i64), ReviewError> {
        let depth = self.readers.with_conn(review_ops::queue_depth)?;
        Ok(depth)
    }
}

/// Store scalar field values verbatim; anything structured keeps its JSON
/// encoding.
fn encode_field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

//! Review item persistence: upsert, atomic claim, completion, assignment,
//! expiry release, filtered listing, and dashboard aggregates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use paperflow_core::models::{QueueFilter, QueueSort, ReviewItem, ReviewStatus};

use crate::{parse_opt_ts, parse_ts, to_storage_err, StorageResult};

const ITEM_COLUMNS: &str = "id, document_id, filename, status, priority, sla_deadline,
                            assigned_to, created_at, claimed_at, completed_at";

/// Insert a review item, or — when one already exists for the document —
/// update only its priority and SLA deadline. Existing identity, status and
/// timestamps survive re-extraction.
pub fn upsert_item(conn: &Connection, item: &ReviewItem) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO review_items
            (id, document_id, filename, status, priority, sla_deadline, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (document_id)
         DO UPDATE SET priority = excluded.priority,
                       sla_deadline = excluded.sla_deadline",
        params![
            item.id,
            item.document_id,
            item.filename,
            item.status.as_str(),
            item.priority,
            item.sla_deadline.map(|t| t.to_rfc3339()),
            item.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Fetch one item (fields not attached).
pub fn get_item(conn: &Connection, id: &str) -> StorageResult<Option<ReviewItem>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM review_items WHERE id = ?1"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;

    stmt.query_row(params![id], row_to_item)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

/// Fetch the item belonging to a document.
pub fn get_item_by_document(
    conn: &Connection,
    document_id: &str,
) -> StorageResult<Option<ReviewItem>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM review_items WHERE document_id = ?1"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;

    stmt.query_row(params![document_id], row_to_item)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

/// Atomic claim: `pending → in_review` with reviewer, claim time, and a
/// fresh SLA deadline, guarded by the status predicate. Returns the number
/// of rows changed — zero means the item was not available.
pub fn claim_item(
    conn: &Connection,
    item_id: &str,
    reviewer_id: &str,
    now: DateTime<Utc>,
    sla_deadline: DateTime<Utc>,
) -> StorageResult<usize> {
    conn.execute(
        "UPDATE review_items
         SET status = 'in_review', assigned_to = ?1, claimed_at = ?2, sla_deadline = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![
            reviewer_id,
            now.to_rfc3339(),
            sla_deadline.to_rfc3339(),
            item_id
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Move an item into a terminal status, stamping completion time.
/// Terminal states are absorbing: the update only matches items that are
/// not yet terminal, or whose terminal status equals the target (so a
/// repeated submission of the same decision refreshes `completed_at`).
pub fn complete_item(
    conn: &Connection,
    item_id: &str,
    status: ReviewStatus,
    completed_at: DateTime<Utc>,
) -> StorageResult<usize> {
    conn.execute(
        "UPDATE review_items SET status = ?1, completed_at = ?2
         WHERE id = ?3
           AND (status NOT IN ('approved','corrected','rejected') OR status = ?1)",
        params![status.as_str(), completed_at.to_rfc3339(), item_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Set the assignee only while the item is still pending.
pub fn assign_if_pending(
    conn: &Connection,
    item_id: &str,
    reviewer_id: &str,
) -> StorageResult<usize> {
    conn.execute(
        "UPDATE review_items SET assigned_to = ?1 WHERE id = ?2 AND status = 'pending'",
        params![reviewer_id, item_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Release all claims older than `cutoff`: back to pending with assignment,
/// claim time and SLA deadline cleared. Returns the count released.
pub fn release_expired(conn: &Connection, cutoff: DateTime<Utc>) -> StorageResult<usize> {
    conn.execute(
        "UPDATE review_items
         SET status = 'pending', assigned_to = NULL, claimed_at = NULL, sla_deadline = NULL
         WHERE status = 'in_review' AND claimed_at < ?1",
        params![cutoff.to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Per-reviewer active load: items in pending or in_review grouped by
/// assignee.
pub fn active_load_by_reviewer(conn: &Connection) -> StorageResult<HashMap<String, i64>> {
    let mut stmt = conn
        .prepare(
            "SELECT assigned_to, COUNT(*) FROM review_items
             WHERE status IN ('pending', 'in_review') AND assigned_to IS NOT NULL
             GROUP BY assigned_to",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut load = HashMap::new();
    for row in rows {
        let (reviewer, count) = row.map_err(|e| to_storage_err(e.to_string()))?;
        load.insert(reviewer, count);
    }
    Ok(load)
}

fn filter_clause(filter: &QueueFilter) -> (String, Vec<rusqlite::types::Value>) {
    use rusqlite::types::Value;

    let mut conditions = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(status) = filter.status {
        conditions.push(format!("status = ?{}", params.len() + 1));
        params.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(assigned_to) = &filter.assigned_to {
        conditions.push(format!("assigned_to = ?{}", params.len() + 1));
        params.push(Value::Text(assigned_to.clone()));
    }
    if let Some(priority_min) = filter.priority_min {
        conditions.push(format!("priority >= ?{}", params.len() + 1));
        params.push(Value::Real(priority_min));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (clause, params)
}

/// One page of items matching the filter (fields not attached).
pub fn query_page(
    conn: &Connection,
    filter: &QueueFilter,
    sort: QueueSort,
    limit: i64,
    offset: i64,
) -> StorageResult<Vec<ReviewItem>> {
    let (clause, mut params) = filter_clause(filter);
    let order = match sort {
        QueueSort::Priority => "priority DESC",
        QueueSort::Sla => "sla_deadline ASC",
        QueueSort::Date => "created_at DESC",
    };

    let limit_idx = params.len() + 1;
    let offset_idx = params.len() + 2;
    params.push(rusqlite::types::Value::Integer(limit));
    params.push(rusqlite::types::Value::Integer(offset));

    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM review_items {clause}
         ORDER BY {order} LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params_from_iter(params.iter()), row_to_item)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(items)
}

/// Total number of items matching the filter.
pub fn count_matching(conn: &Connection, filter: &QueueFilter) -> StorageResult<i64> {
    let (clause, params) = filter_clause(filter);
    let sql = format!("SELECT COUNT(*) FROM review_items {clause}");
    conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))
}

/// Items currently pending or in review (the queue depth).
pub fn queue_depth(conn: &Connection) -> StorageResult<(i64, i64)> {
    let pending: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM review_items WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let in_review: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM review_items WHERE status = 'in_review'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok((pending, in_review))
}

/// Items completed at or after the given instant (start of today, UTC).
pub fn completed_since(conn: &Connection, since: DateTime<Utc>) -> StorageResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM review_items
         WHERE completed_at IS NOT NULL AND completed_at >= ?1",
        params![since.to_rfc3339()],
        |row| row.get(0),
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Average seconds between claim and completion, over fully timed items.
pub fn avg_review_seconds(conn: &Connection) -> StorageResult<f64> {
    let avg: Option<f64> = conn
        .query_row(
            "SELECT AVG((julianday(completed_at) - julianday(claimed_at)) * 86400.0)
             FROM review_items
             WHERE completed_at IS NOT NULL AND claimed_at IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(avg.unwrap_or(0.0))
}

/// (completed on time, completed total) for SLA compliance.
pub fn sla_completion_counts(conn: &Connection) -> StorageResult<(i64, i64)> {
    let total: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM review_items WHERE completed_at IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let on_time: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM review_items
             WHERE completed_at IS NOT NULL AND completed_at <= sla_deadline",
            [],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok((on_time, total))
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<StorageResult<ReviewItem>> {
    let status_raw: String = row.get(3)?;
    let id: String = row.get(0)?;
    let document_id: String = row.get(1)?;
    let filename: String = row.get(2)?;
    let priority: f64 = row.get(4)?;
    let sla_raw: Option<String> = row.get(5)?;
    let assigned_to: Option<String> = row.get(6)?;
    let created_raw: String = row.get(7)?;
    let claimed_raw: Option<String> = row.get(8)?;
    let completed_raw: Option<String> = row.get(9)?;

    Ok((|| {
        let status = ReviewStatus::parse(&status_raw)
            .ok_or_else(|| to_storage_err(format!("unknown review status '{status_raw}'")))?;
        Ok(ReviewItem {
            id,
            document_id,
            filename,
            status,
            priority,
            sla_deadline: parse_opt_ts(sla_raw.as_deref())?,
            assigned_to,
            created_at: parse_ts(&created_raw)?,
            claimed_at: parse_opt_ts(claimed_raw.as_deref())?,
            completed_at: parse_opt_ts(completed_raw.as_deref())?,
            fields: vec![],
        })
    })())
}

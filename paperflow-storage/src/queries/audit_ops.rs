//! Audit log insert and query. Rows are append-only; there is deliberately
//! no update or delete here.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use paperflow_core::models::{AuditAction, AuditEntry};

use crate::{parse_ts, to_storage_err, StorageResult};

/// Append one audit record.
#[allow(clippy::too_many_arguments)]
pub fn insert_entry(
    conn: &Connection,
    item_id: &str,
    action: AuditAction,
    field_name: Option<&str>,
    old_value: Option<&str>,
    new_value: Option<&str>,
    actor: Option<&str>,
    created_at: DateTime<Utc>,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO audit_log (item_id, action, field_name, old_value, new_value, actor, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            item_id,
            action.as_str(),
            field_name,
            old_value,
            new_value,
            actor,
            created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// All audit entries for an item, oldest first.
pub fn entries_for_item(conn: &Connection, item_id: &str) -> StorageResult<Vec<AuditEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, item_id, action, field_name, old_value, new_value, actor, created_at
             FROM audit_log WHERE item_id = ?1
             ORDER BY id ASC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![item_id], row_to_entry)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(entries)
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<StorageResult<AuditEntry>> {
    let id: i64 = row.get(0)?;
    let item_id: String = row.get(1)?;
    let action_raw: String = row.get(2)?;
    let field_name: Option<String> = row.get(3)?;
    let old_value: Option<String> = row.get(4)?;
    let new_value: Option<String> = row.get(5)?;
    let actor: Option<String> = row.get(6)?;
    let created_raw: String = row.get(7)?;

    Ok((|| {
        let action = AuditAction::parse(&action_raw)
            .ok_or_else(|| to_storage_err(format!("unknown audit action '{action_raw}'")))?;
        Ok(AuditEntry {
            id,
            item_id,
            action,
            field_name,
            old_value,
            new_value,
            actor,
            created_at: parse_ts(&created_raw)?,
        })
    })())
}

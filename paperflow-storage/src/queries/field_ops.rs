//! Extracted-field persistence, including the lock semantics: a locked row's
//! value is never rewritten by any code path here.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use paperflow_core::models::ExtractedField;

use crate::{parse_opt_ts, to_storage_err, StorageResult};

const FIELD_COLUMNS: &str = "id, review_item_id, field_name, value, confidence,
                             manually_corrected, corrected_at, corrected_by, locked";

/// Insert a freshly extracted field.
pub fn insert_field(conn: &Connection, field: &ExtractedField) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO extracted_fields (
            id, review_item_id, field_name, value, confidence,
            manually_corrected, corrected_at, corrected_by, locked
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            field.id,
            field.review_item_id,
            field.field_name,
            field.value,
            field.confidence,
            field.manually_corrected as i32,
            field.corrected_at.map(|t| t.to_rfc3339()),
            field.corrected_by,
            field.locked as i32,
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Delete every non-locked field of an item. Locked fields survive.
pub fn delete_unlocked_fields(conn: &Connection, review_item_id: &str) -> StorageResult<usize> {
    conn.execute(
        "DELETE FROM extracted_fields WHERE review_item_id = ?1 AND locked = 0",
        params![review_item_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Names of fields that are locked for an item.
pub fn locked_field_names(
    conn: &Connection,
    review_item_id: &str,
) -> StorageResult<HashSet<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT field_name FROM extracted_fields
             WHERE review_item_id = ?1 AND locked = 1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![review_item_id], |row| row.get::<_, String>(0))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut names = HashSet::new();
    for row in rows {
        names.insert(row.map_err(|e| to_storage_err(e.to_string()))?);
    }
    Ok(names)
}

/// Look up one field by item + name.
pub fn get_field(
    conn: &Connection,
    review_item_id: &str,
    field_name: &str,
) -> StorageResult<Option<ExtractedField>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {FIELD_COLUMNS} FROM extracted_fields
             WHERE review_item_id = ?1 AND field_name = ?2"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;

    stmt.query_row(params![review_item_id, field_name], row_to_field)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

/// All fields of one item.
pub fn fields_for_item(
    conn: &Connection,
    review_item_id: &str,
) -> StorageResult<Vec<ExtractedField>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {FIELD_COLUMNS} FROM extracted_fields
             WHERE review_item_id = ?1
             ORDER BY field_name"
        ))
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![review_item_id], row_to_field)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut fields = Vec::new();
    for row in rows {
        fields.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(fields)
}

/// Batch fetch for a page of items in one query (avoids N+1), grouped by
/// item id.
pub fn fields_for_items(
    conn: &Connection,
    item_ids: &[String],
) -> StorageResult<HashMap<String, Vec<ExtractedField>>> {
    if item_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = (1..=item_ids.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {FIELD_COLUMNS} FROM extracted_fields
         WHERE review_item_id IN ({placeholders})
         ORDER BY review_item_id, field_name"
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params_from_iter(item_ids.iter()), row_to_field)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut grouped: HashMap<String, Vec<ExtractedField>> = HashMap::new();
    for row in rows {
        let field = row.map_err(|e| to_storage_err(e.to_string()))??;
        grouped
            .entry(field.review_item_id.clone())
            .or_default()
            .push(field);
    }
    Ok(grouped)
}

/// Apply a manual correction: new value, corrected-by metadata, and the
/// permanent lock. The caller must have verified the row is not locked.
pub fn apply_correction(
    conn: &Connection,
    field_id: &str,
    new_value: &str,
    corrected_by: &str,
    now: DateTime<Utc>,
) -> StorageResult<usize> {
    conn.execute(
        "UPDATE extracted_fields
         SET value = ?1, manually_corrected = 1, corrected_at = ?2,
             corrected_by = ?3, locked = 1
         WHERE id = ?4 AND locked = 0",
        params![new_value, now.to_rfc3339(), corrected_by, field_id],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

fn row_to_field(row: &Row<'_>) -> rusqlite::Result<StorageResult<ExtractedField>> {
    let id: String = row.get(0)?;
    let review_item_id: String = row.get(1)?;
    let field_name: String = row.get(2)?;
    let value: Option<String> = row.get(3)?;
    let confidence: f64 = row.get(4)?;
    let manually_corrected: i32 = row.get(5)?;
    let corrected_raw: Option<String> = row.get(6)?;
    let corrected_by: Option<String> = row.get(7)?;
    let locked: i32 = row.get(8)?;

    Ok((|| {
        Ok(ExtractedField {
            id,
            review_item_id,
            field_name,
            value,
            confidence,
            manually_corrected: manually_corrected != 0,
            corrected_at: parse_opt_ts(corrected_raw.as_deref())?,
            corrected_by,
            locked: locked != 0,
        })
    })())
}

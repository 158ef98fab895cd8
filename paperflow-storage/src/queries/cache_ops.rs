//! Idempotency cache rows: content-hash keyed extraction results.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{parse_ts, to_storage_err, StorageResult};

/// A cached extraction result keyed by the content hash of the original
/// file bytes.
#[derive(Debug, Clone)]
pub struct CachedExtraction {
    pub content_hash: String,
    /// The document id of the *first* upload of these bytes.
    pub document_id: String,
    pub filename: String,
    pub result_json: String,
    pub created_at: DateTime<Utc>,
}

/// Insert-if-absent: the first writer for a hash wins, later inserts are
/// no-ops. Returns whether a row was actually inserted.
pub fn insert_if_absent(
    conn: &Connection,
    content_hash: &str,
    document_id: &str,
    filename: &str,
    result_json: &str,
    created_at: DateTime<Utc>,
) -> StorageResult<bool> {
    let changed = conn
        .execute(
            "INSERT INTO processed_documents
                (content_hash, document_id, filename, result_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (content_hash) DO NOTHING",
            params![
                content_hash,
                document_id,
                filename,
                result_json,
                created_at.to_rfc3339()
            ],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(changed > 0)
}

/// Look up a cached result by hash.
pub fn get_by_hash(
    conn: &Connection,
    content_hash: &str,
) -> StorageResult<Option<CachedExtraction>> {
    let mut stmt = conn
        .prepare(
            "SELECT content_hash, document_id, filename, result_json, created_at
             FROM processed_documents WHERE content_hash = ?1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let row = stmt
        .query_row(params![content_hash], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?;

    match row {
        None => Ok(None),
        Some((content_hash, document_id, filename, result_json, created_raw)) => {
            Ok(Some(CachedExtraction {
                content_hash,
                document_id,
                filename,
                result_json,
                created_at: parse_ts(&created_raw)?,
            }))
        }
    }
}

pub fn count_rows(conn: &Connection) -> StorageResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM processed_documents", [], |row| {
        row.get(0)
    })
    .map_err(|e| to_storage_err(e.to_string()))
}

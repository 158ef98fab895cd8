//! Insert, get, status updates, and listing for documents.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use paperflow_core::models::{Document, DocumentStatus};

use crate::{parse_ts, to_storage_err, StorageResult};

/// Insert a new document row.
pub fn insert_document(conn: &Connection, doc: &Document) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO documents (
            id, stored_name, original_name, mime_type, status,
            task_id, error_message, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            doc.id,
            doc.stored_name,
            doc.original_name,
            doc.mime_type,
            doc.status.as_str(),
            doc.task_id,
            doc.error_message,
            doc.created_at.to_rfc3339(),
            doc.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Get a single document by id.
pub fn get_document(conn: &Connection, id: &str) -> StorageResult<Option<Document>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, stored_name, original_name, mime_type, status,
                    task_id, error_message, created_at, updated_at
             FROM documents WHERE id = ?1",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    stmt.query_row(params![id], row_to_document)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .transpose()
}

/// Update document status (and error message), bumping updated_at.
pub fn update_status(
    conn: &Connection,
    id: &str,
    status: DocumentStatus,
    error_message: Option<&str>,
) -> StorageResult<usize> {
    let changed = conn
        .execute(
            "UPDATE documents
             SET status = ?1, error_message = ?2, updated_at = ?3
             WHERE id = ?4",
            params![status.as_str(), error_message, Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(changed)
}

/// Attach the broker task id to a freshly enqueued document.
pub fn set_task_id(conn: &Connection, id: &str, task_id: &str) -> StorageResult<usize> {
    let changed = conn
        .execute(
            "UPDATE documents SET task_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![task_id, Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(changed)
}

/// Most recent documents, newest first.
pub fn list_recent(conn: &Connection, limit: i64, offset: i64) -> StorageResult<Vec<Document>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, stored_name, original_name, mime_type, status,
                    task_id, error_message, created_at, updated_at
             FROM documents
             ORDER BY created_at DESC
             LIMIT ?1 OFFSET ?2",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![limit, offset], row_to_document)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(row.map_err(|e| to_storage_err(e.to_string()))??);
    }
    Ok(docs)
}

pub fn count_documents(conn: &Connection) -> StorageResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<StorageResult<Document>> {
    let status_raw: String = row.get(4)?;
    let created_raw: String = row.get(7)?;
    let updated_raw: String = row.get(8)?;
    let id: String = row.get(0)?;
    let stored_name: String = row.get(1)?;
    let original_name: String = row.get(2)?;
    let mime_type: String = row.get(3)?;
    let task_id: Option<String> = row.get(5)?;
    let error_message: Option<String> = row.get(6)?;

    Ok((|| {
        let status = DocumentStatus::parse(&status_raw)
            .ok_or_else(|| to_storage_err(format!("unknown document status '{status_raw}'")))?;
        Ok(Document {
            id,
            stored_name,
            original_name,
            mime_type,
            status,
            task_id,
            error_message,
            created_at: parse_ts(&created_raw)?,
            updated_at: parse_ts(&updated_raw)?,
        })
    })())
}

//! Content-hash keyed idempotency over the processed_documents cache.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use paperflow_core::errors::PipelineError;
use paperflow_core::models::ExtractionResult;
use paperflow_storage::pool::WriteConnection;
use paperflow_storage::queries::cache_ops;

use crate::content_hash::content_hash;

/// Hash-keyed lookup and insert-if-absent over extraction results.
pub struct IdempotencyStore {
    writer: Arc<WriteConnection>,
}

impl IdempotencyStore {
    pub fn new(writer: Arc<WriteConnection>) -> Self {
        Self { writer }
    }

    /// Hash the file and return the cached result when these bytes were
    /// already processed.
    pub async fn get_cached(
        &self,
        path: &Path,
    ) -> Result<Option<ExtractionResult>, PipelineError> {
        let hash = content_hash(path)?;
        self.lookup(&hash).await
    }

    /// Look up a cached result by a precomputed hash.
    pub async fn lookup(&self, hash: &str) -> Result<Option<ExtractionResult>, PipelineError> {
        let hash_owned = hash.to_string();
        let row = self
            .writer
            .with_conn(move |conn| cache_ops::get_by_hash(conn, &hash_owned))
            .await?;

        match row {
            None => Ok(None),
            Some(cached) => {
                info!(hash = &hash[..12.min(hash.len())], "idempotency cache HIT");
                let result: ExtractionResult = serde_json::from_str(&cached.result_json)?;
                Ok(Some(result))
            }
        }
    }

    /// Persist a result keyed by its content hash. First writer wins; a
    /// result without a hash is skipped.
    pub async fn cache_result(&self, result: &ExtractionResult) -> Result<bool, PipelineError> {
        let Some(hash) = result.content_hash.clone() else {
            return Ok(false);
        };
        let document_id = result.document_id.clone();
        let filename = result.filename.clone();
        let result_json = serde_json::to_string(result)?;

        let inserted = self
            .writer
            .with_conn(move |conn| {
                cache_ops::insert_if_absent(
                    conn,
                    &hash,
                    &document_id,
                    &filename,
                    &result_json,
                    Utc::now(),
                )
            })
            .await?;
        Ok(inserted)
    }
}

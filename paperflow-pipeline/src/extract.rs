//! Extraction adapter: reads the file, detects its MIME type, calls the
//! provider through the circuit breaker, and assembles the full
//! ExtractionResult with confidences and the content hash.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::info;

use paperflow_core::errors::PipelineError;
use paperflow_core::models::{
    mime_for_extension, ExtractionResult, InvoiceData, StructuredInvoice, RESULT_SCHEMA_VERSION,
};
use paperflow_core::traits::Extractor;
use paperflow_workflow::{CircuitBreaker, CircuitCallError};

use crate::confidence;
use crate::content_hash::content_hash_bytes;

/// Wraps the black-box extraction provider with the circuit breaker and
/// converts its output into the pipeline's result type.
pub struct ExtractionAdapter {
    extractor: Arc<dyn Extractor>,
    breaker: Arc<CircuitBreaker>,
}

impl ExtractionAdapter {
    pub fn new(extractor: Arc<dyn Extractor>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { extractor, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Extract structured invoice data from the file at `path`.
    pub async fn extract_file(
        &self,
        path: &Path,
        document_id: &str,
    ) -> Result<ExtractionResult, PipelineError> {
        let t0 = Instant::now();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime_type = mime_for_extension(extension).ok_or_else(|| {
            PipelineError::UnsupportedFileType {
                extension: extension.to_string(),
            }
        })?;

        let bytes = std::fs::read(path)?;
        let hash = content_hash_bytes(&bytes);

        info!(
            document = document_id,
            mime = mime_type,
            kib = bytes.len() / 1024,
            "sending document to extractor"
        );

        let invoice = self
            .breaker
            .call(self.extractor.extract(&bytes, mime_type))
            .await
            .map_err(|e| match e {
                CircuitCallError::Open { .. } => PipelineError::ExtractionFailed(e.to_string()),
                CircuitCallError::Inner(inner) => {
                    PipelineError::ExtractionFailed(inner.to_string())
                }
            })?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(document_id)
            .to_string();

        let result = assemble_result(
            document_id,
            &filename,
            invoice,
            t0.elapsed().as_secs_f64(),
            hash,
        );

        info!(
            document = document_id,
            elapsed = result.processing_time_seconds,
            confidence = result.overall_confidence,
            "extraction complete"
        );
        Ok(result)
    }
}

/// Convert the provider invoice into the persisted result shape.
fn assemble_result(
    document_id: &str,
    filename: &str,
    invoice: StructuredInvoice,
    elapsed_seconds: f64,
    hash: String,
) -> ExtractionResult {
    let data = InvoiceData {
        vendor: invoice.vendor.value.clone(),
        invoice_number: invoice.invoice_number.value.clone(),
        date: invoice.date.value.clone(),
        due_date: invoice.due_date.value.clone().filter(|d| !d.is_empty()),
        subtotal: invoice.subtotal.value,
        tax_rate: invoice.tax_rate.value,
        tax_amount: invoice.tax_amount.value,
        total: invoice.total.value,
        currency: invoice.currency.value.clone(),
        line_items: invoice.line_items.clone(),
    };

    let field_confidences = confidence::field_confidences(&invoice, &data);
    let overall_confidence = confidence::overall(&field_confidences);

    ExtractionResult {
        document_id: document_id.to_string(),
        filename: filename.to_string(),
        invoice_data: data,
        field_confidences,
        overall_confidence,
        extracted_at: Utc::now(),
        processing_time_seconds: (elapsed_seconds * 100.0).round() / 100.0,
        content_hash: Some(hash),
        schema_version: RESULT_SCHEMA_VERSION.to_string(),
    }
}

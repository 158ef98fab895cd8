//! Dual-format result persistence: a structured JSON document and a flat
//! parquet row, both date-partitioned and written atomically via a `*.tmp`
//! sibling + rename.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parquet::basic::Compression;
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, FloatType, Int32Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedFileWriter, SerializedRowGroupWriter};
use parquet::schema::parser::parse_message_type;
use tracing::info;

use paperflow_core::errors::PipelineError;
use paperflow_core::models::ExtractionResult;

/// Columnar schema for one flattened invoice.
const FLAT_INVOICE_SCHEMA: &str = "
message flat_invoice {
    required binary document_id (UTF8);
    required binary filename (UTF8);
    required binary vendor (UTF8);
    required binary invoice_number (UTF8);
    required binary date (UTF8);
    required binary due_date (UTF8);
    required double subtotal;
    required float tax_rate;
    required double tax_amount;
    required double total;
    required binary currency (UTF8);
    required int32 num_line_items;
    required binary line_items_json (UTF8);
    required float confidence_score;
    required binary extracted_at (UTF8);
    required binary content_hash (UTF8);
    required binary schema_version (UTF8);
}
";

/// Writes the dual outputs under `<dir>/YYYY/MM/DD/<doc_id>.<ext>`.
pub struct OutputWriter {
    parquet_dir: PathBuf,
    json_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(parquet_dir: &Path, json_dir: &Path) -> Self {
        Self {
            parquet_dir: parquet_dir.to_path_buf(),
            json_dir: json_dir.to_path_buf(),
        }
    }

    /// Write the structured JSON document. Returns the final path.
    pub fn write_json(&self, result: &ExtractionResult) -> Result<PathBuf, PipelineError> {
        let dir = self.json_dir.join(date_partition());
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", result.document_id));

        let body = serde_json::to_vec_pretty(result)?;
        atomic_write(&path, |tmp| std::fs::write(tmp, &body).map_err(PipelineError::Io))?;

        info!(path = %path.display(), "wrote structured document");
        Ok(path)
    }

    /// Write the flat columnar row. Returns the final path.
    pub fn write_parquet(&self, result: &ExtractionResult) -> Result<PathBuf, PipelineError> {
        let dir = self.parquet_dir.join(date_partition());
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.parquet", result.document_id));

        atomic_write(&path, |tmp| write_parquet_file(tmp, result))?;

        info!(path = %path.display(), "wrote columnar row");
        Ok(path)
    }
}

fn date_partition() -> String {
    Utc::now().format("%Y/%m/%d").to_string()
}

/// Write into `<final>.tmp`, then rename over the final name. On any error
/// the temp file is unlinked and the error propagates.
fn atomic_write(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<(), PipelineError>,
) -> Result<(), PipelineError> {
    let tmp = tmp_sibling(path);
    match write(&tmp).and_then(|()| std::fs::rename(&tmp, path).map_err(PipelineError::Io)) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_parquet_file(path: &Path, result: &ExtractionResult) -> Result<(), PipelineError> {
    let schema = Arc::new(
        parse_message_type(FLAT_INVOICE_SCHEMA).map_err(|e| pq_err(path, e.to_string()))?,
    );
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build(),
    );

    let inv = &result.invoice_data;
    let line_items_json = serde_json::to_string(&inv.line_items)?;

    let file = File::create(path)?;
    let mut writer =
        SerializedFileWriter::new(file, schema, props).map_err(|e| pq_err(path, e.to_string()))?;

    {
        let mut rg = writer
            .next_row_group()
            .map_err(|e| pq_err(path, e.to_string()))?;

        // Column order must match the schema exactly.
        write_str(&mut rg, path, &result.document_id)?;
        write_str(&mut rg, path, &result.filename)?;
        write_str(&mut rg, path, inv.vendor.as_deref().unwrap_or(""))?;
        write_str(&mut rg, path, inv.invoice_number.as_deref().unwrap_or(""))?;
        write_str(&mut rg, path, inv.date.as_deref().unwrap_or(""))?;
        write_str(&mut rg, path, inv.due_date.as_deref().unwrap_or(""))?;
        write_f64(&mut rg, path, inv.subtotal.unwrap_or(0.0))?;
        write_f32(&mut rg, path, inv.tax_rate.unwrap_or(0.0) as f32)?;
        write_f64(&mut rg, path, inv.tax_amount.unwrap_or(0.0))?;
        write_f64(&mut rg, path, inv.total.unwrap_or(0.0))?;
        write_str(&mut rg, path, inv.currency.as_deref().unwrap_or(""))?;
        write_i32(&mut rg, path, inv.line_items.len() as i32)?;
        write_str(&mut rg, path, &line_items_json)?;
        write_f32(&mut rg, path, result.overall_confidence as f32)?;
        write_str(&mut rg, path, &result.extracted_at.to_rfc3339())?;
        write_str(&mut rg, path, result.content_hash.as_deref().unwrap_or(""))?;
        write_str(&mut rg, path, &result.schema_version)?;

        rg.close().map_err(|e| pq_err(path, e.to_string()))?;
    }

    writer.close().map_err(|e| pq_err(path, e.to_string()))?;
    Ok(())
}

fn write_str(
    rg: &mut SerializedRowGroupWriter<'_, File>,
    path: &Path,
    value: &str,
) -> Result<(), PipelineError> {
    let mut col = rg
        .next_column()
        .map_err(|e| pq_err(path, e.to_string()))?
        .ok_or_else(|| pq_err(path, "schema exhausted".to_string()))?;
    col.typed::<ByteArrayType>()
        .write_batch(&[ByteArray::from(value)], None, None)
        .map_err(|e| pq_err(path, e.to_string()))?;
    col.close().map_err(|e| pq_err(path, e.to_string()))?;
    Ok(())
}

fn write_f64(
    rg: &mut SerializedRowGroupWriter<'_, File>,
    path: &Path,
    value: f64,
) -> Result<(), PipelineError> {
    let mut col = rg
        .next_column()
        .map_err(|e| pq_err(path, e.to_string()))?
        .ok_or_else(|| pq_err(path, "schema exhausted".to_string()))?;
    col.typed::<DoubleType>()
        .write_batch(&[value], None, None)
        .map_err(|e| pq_err(path, e.to_string()))?;
    col.close().map_err(|e| pq_err(path, e.to_string()))?;
    Ok(())
}

fn write_f32(
    rg: &mut SerializedRowGroupWriter<'_, File>,
    path: &Path,
    value: f32,
) -> Result<(), PipelineError> {
    let mut col = rg
        .next_column()
        .map_err(|e| pq_err(path, e.to_string()))?
        .ok_or_else(|| pq_err(path, "schema exhausted".to_string()))?;
    col.typed::<FloatType>()
        .write_batch(&[value], None, None)
        .map_err(|e| pq_err(path, e.to_string()))?;
    col.close().map_err(|e| pq_err(path, e.to_string()))?;
    Ok(())
}

fn write_i32(
    rg: &mut SerializedRowGroupWriter<'_, File>,
    path: &Path,
    value: i32,
) -> Result<(), PipelineError> {
    let mut col = rg
        .next_column()
        .map_err(|e| pq_err(path, e.to_string()))?
        .ok_or_else(|| pq_err(path, "schema exhausted".to_string()))?;
    col.typed::<Int32Type>()
        .write_batch(&[value], None, None)
        .map_err(|e| pq_err(path, e.to_string()))?;
    col.close().map_err(|e| pq_err(path, e.to_string()))?;
    Ok(())
}

fn pq_err(path: &Path, reason: String) -> PipelineError {
    PipelineError::OutputWriteFailed {
        path: path.display().to_string(),
        reason,
    }
}

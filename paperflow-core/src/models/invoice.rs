//! Invoice extraction types: InvoiceData, FieldConfidence, ExtractionResult,
//! and the raw provider output StructuredInvoice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single line item on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total: f64,
}

/// Structured invoice header + line items. All header fields are optional;
/// absent values simply lower the field confidence downstream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceData {
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub date: Option<String>,
    pub due_date: Option<String>,
    pub subtotal: Option<f64>,
    pub tax_rate: Option<f64>,
    pub tax_amount: Option<f64>,
    pub total: Option<f64>,
    pub currency: Option<String>,
    pub line_items: Vec<LineItem>,
}

/// Confidence score for a single extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub field_name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// 0–1.
    pub confidence: f64,
}

/// Full result of extracting data from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_id: String,
    pub filename: String,
    pub invoice_data: InvoiceData,
    #[serde(default)]
    pub field_confidences: Vec<FieldConfidence>,
    pub overall_confidence: f64,
    pub extracted_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    #[serde(default)]
    pub content_hash: Option<String>,
    pub schema_version: String,
}

/// Current version written into every result and output file.
pub const RESULT_SCHEMA_VERSION: &str = "1.0.0";

/// One provider field: extracted value plus optional provider confidence.
/// A `None` confidence means the provider gave no per-field score and the
/// heuristic scorer decides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidentField<T> {
    pub value: Option<T>,
    pub confidence: Option<f64>,
}

impl<T> ConfidentField<T> {
    pub fn new(value: T, confidence: f64) -> Self {
        Self {
            value: Some(value),
            confidence: Some(confidence),
        }
    }

    pub fn unscored(value: T) -> Self {
        Self {
            value: Some(value),
            confidence: None,
        }
    }

    pub fn absent() -> Self {
        Self {
            value: None,
            confidence: None,
        }
    }
}

/// Raw output of the external extraction provider: header fields with
/// per-field confidence, line items, and a group confidence for the
/// line-item list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredInvoice {
    pub vendor: ConfidentField<String>,
    pub invoice_number: ConfidentField<String>,
    pub date: ConfidentField<String>,
    pub due_date: ConfidentField<String>,
    pub subtotal: ConfidentField<f64>,
    pub tax_rate: ConfidentField<f64>,
    pub tax_amount: ConfidentField<f64>,
    pub total: ConfidentField<f64>,
    pub currency: ConfidentField<String>,
    pub line_items: Vec<LineItem>,
    pub line_items_confidence: Option<f64>,
}

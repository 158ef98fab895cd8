//! Domain model invariants: status parsing, terminality, MIME detection,
//! and serde round-trips for the extraction result.

use chrono::Utc;

use paperflow_core::models::*;

#[test]
fn document_status_round_trip() {
    for s in [
        DocumentStatus::Queued,
        DocumentStatus::Processing,
        DocumentStatus::Completed,
        DocumentStatus::Failed,
        DocumentStatus::Duplicate,
    ] {
        assert_eq!(DocumentStatus::parse(s.as_str()), Some(s));
    }
    assert_eq!(DocumentStatus::parse("bogus"), None);
}

#[test]
fn terminal_sets_match_lifecycle() {
    assert!(!DocumentStatus::Queued.is_terminal());
    assert!(!DocumentStatus::Processing.is_terminal());
    assert!(DocumentStatus::Completed.is_terminal());
    assert!(DocumentStatus::Failed.is_terminal());
    assert!(DocumentStatus::Duplicate.is_terminal());

    assert!(!ReviewStatus::Pending.is_terminal());
    assert!(!ReviewStatus::InReview.is_terminal());
    assert!(ReviewStatus::Approved.is_terminal());
    assert!(ReviewStatus::Corrected.is_terminal());
    assert!(ReviewStatus::Rejected.is_terminal());
}

#[test]
fn review_action_targets() {
    assert_eq!(ReviewAction::Approve.target_status(), ReviewStatus::Approved);
    assert_eq!(ReviewAction::Correct.target_status(), ReviewStatus::Corrected);
    assert_eq!(ReviewAction::Reject.target_status(), ReviewStatus::Rejected);
}

#[test]
fn mime_detection_covers_supported_types() {
    assert_eq!(mime_for_extension("pdf"), Some("application/pdf"));
    assert_eq!(mime_for_extension("PDF"), Some("application/pdf"));
    assert_eq!(mime_for_extension("jpeg"), Some("image/jpeg"));
    assert_eq!(mime_for_extension("tif"), Some("image/tiff"));
    assert_eq!(mime_for_extension("docx"), None);
}

fn sample_result() -> ExtractionResult {
    ExtractionResult {
        document_id: "doc-1".into(),
        filename: "doc-1.pdf".into(),
        invoice_data: InvoiceData {
            vendor: Some("Acme GmbH".into()),
            invoice_number: Some("INV-42".into()),
            date: Some("2026-07-01".into()),
            due_date: Some("2026-07-31".into()),
            subtotal: Some(100.0),
            tax_rate: Some(7.7),
            tax_amount: Some(7.7),
            total: Some(107.7),
            currency: Some("CHF".into()),
            line_items: vec![LineItem {
                item: "widget".into(),
                quantity: 2,
                unit_price: 50.0,
                total: 100.0,
            }],
        },
        field_confidences: vec![FieldConfidence {
            field_name: "vendor".into(),
            value: Some(serde_json::json!("Acme GmbH")),
            confidence: 0.92,
        }],
        overall_confidence: 0.91,
        extracted_at: Utc::now(),
        processing_time_seconds: 1.25,
        content_hash: Some("abc123".into()),
        schema_version: invoice::RESULT_SCHEMA_VERSION.into(),
    }
}

#[test]
fn extraction_result_serde_round_trip() {
    let result = sample_result();
    let json = serde_json::to_string(&result).unwrap();
    let back: ExtractionResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn structured_invoice_defaults_deserialize() {
    // A provider may omit everything; all fields default.
    let inv: StructuredInvoice = serde_json::from_str("{}").unwrap();
    assert!(inv.vendor.value.is_none());
    assert!(inv.line_items.is_empty());
    assert!(inv.line_items_confidence.is_none());
}

//! Heuristic confidence scoring, used when the extraction provider supplies
//! no per-field confidence. Scores derive from completeness and cross-field
//! consistency signals.

use serde_json::Value;

use paperflow_core::models::{FieldConfidence, InvoiceData, StructuredInvoice};

/// Base score per header field before completeness penalties.
fn base_score(field_name: &str) -> f64 {
    match field_name {
        "vendor" => 0.92,
        "invoice_number" => 0.93,
        "date" => 0.90,
        "due_date" => 0.80,
        "subtotal" => 0.85,
        "tax_rate" => 0.80,
        "tax_amount" => 0.82,
        "total" => 0.95,
        "currency" => 0.88,
        _ => 0.80,
    }
}

/// Penalize empty, zero, or suspiciously short values.
fn score_value(value: Option<&Value>, base: f64) -> f64 {
    match value {
        None | Some(Value::Null) => 0.40,
        Some(Value::String(s)) if s.is_empty() => 0.40,
        Some(Value::String(s)) if s.chars().count() < 2 => 0.60,
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => 0.40,
        _ => base,
    }
}

/// Per-field confidences for a provider invoice. Provider-supplied scores
/// are authoritative; the heuristic fills the gaps. The `line_items` entry
/// scores group consistency against the subtotal.
pub fn field_confidences(invoice: &StructuredInvoice, data: &InvoiceData) -> Vec<FieldConfidence> {
    let mut scores = Vec::with_capacity(10);

    let mut push = |name: &str, value: Option<Value>, provided: Option<f64>| {
        let confidence = provided.unwrap_or_else(|| score_value(value.as_ref(), base_score(name)));
        scores.push(FieldConfidence {
            field_name: name.to_string(),
            value,
            confidence: round2(confidence.clamp(0.0, 1.0)),
        });
    };

    push(
        "vendor",
        invoice.vendor.value.clone().map(Value::from),
        invoice.vendor.confidence,
    );
    push(
        "invoice_number",
        invoice.invoice_number.value.clone().map(Value::from),
        invoice.invoice_number.confidence,
    );
    push(
        "date",
        invoice.date.value.clone().map(Value::from),
        invoice.date.confidence,
    );
    push(
        "due_date",
        invoice.due_date.value.clone().map(Value::from),
        invoice.due_date.confidence,
    );
    push(
        "subtotal",
        invoice.subtotal.value.map(Value::from),
        invoice.subtotal.confidence,
    );
    push(
        "tax_rate",
        invoice.tax_rate.value.map(Value::from),
        invoice.tax_rate.confidence,
    );
    push(
        "tax_amount",
        invoice.tax_amount.value.map(Value::from),
        invoice.tax_amount.confidence,
    );
    push(
        "total",
        invoice.total.value.map(Value::from),
        invoice.total.confidence,
    );
    push(
        "currency",
        invoice.currency.value.clone().map(Value::from),
        invoice.currency.confidence,
    );

    // Line items: provider group confidence, else consistency with subtotal.
    let line_items_value = serde_json::to_value(&data.line_items).ok();
    let line_items_conf = invoice.line_items_confidence.unwrap_or_else(|| {
        if data.line_items.is_empty() {
            0.50
        } else {
            let li_total: f64 = data.line_items.iter().map(|li| li.total).sum();
            match data.subtotal {
                Some(subtotal) if (li_total - subtotal).abs() / subtotal.max(1.0) < 0.05 => 0.90,
                _ => 0.70,
            }
        }
    });
    scores.push(FieldConfidence {
        field_name: "line_items".to_string(),
        value: line_items_value,
        confidence: round2(line_items_conf.clamp(0.0, 1.0)),
    });

    apply_cross_field_boost(data, &mut scores);
    scores
}

/// A total that matches subtotal + tax within 2% raises trust in all three
/// amounts.
fn apply_cross_field_boost(data: &InvoiceData, scores: &mut [FieldConfidence]) {
    let (Some(subtotal), Some(tax_amount), Some(total)) =
        (data.subtotal, data.tax_amount, data.total)
    else {
        return;
    };
    if subtotal == 0.0 || tax_amount == 0.0 {
        return;
    }
    let expected = subtotal + tax_amount;
    if (expected - total).abs() / total.max(1.0) < 0.02 {
        for score in scores.iter_mut() {
            if matches!(score.field_name.as_str(), "total" | "subtotal" | "tax_amount") {
                score.confidence = round2((score.confidence + 0.05).min(1.0));
            }
        }
    }
}

/// Mean of the per-field confidences, rounded to three decimals.
pub fn overall(scores: &[FieldConfidence]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let sum: f64 = scores.iter().map(|s| s.confidence).sum();
    round3(sum / scores.len() as f64)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

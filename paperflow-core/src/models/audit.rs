//! Append-only audit log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Auditable review-queue actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StartReview,
    Correction,
    Approval,
    Rejection,
    AutoAssign,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StartReview => "start_review",
            AuditAction::Correction => "correction",
            AuditAction::Approval => "approval",
            AuditAction::Rejection => "rejection",
            AuditAction::AutoAssign => "auto_assign",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start_review" => Some(AuditAction::StartReview),
            "correction" => Some(AuditAction::Correction),
            "approval" => Some(AuditAction::Approval),
            "rejection" => Some(AuditAction::Rejection),
            "auto_assign" => Some(AuditAction::AutoAssign),
            _ => None,
        }
    }
}

/// One audit record. Rows are inserted and never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub item_id: String,
    pub action: AuditAction,
    pub field_name: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

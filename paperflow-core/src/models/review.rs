//! Review-queue types: ReviewItem, ExtractedField, submissions, filters,
//! pagination, and dashboard stats.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a review item. `Approved`, `Corrected` and `Rejected` are
/// terminal and absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InReview,
    Approved,
    Corrected,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::InReview => "in_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Corrected => "corrected",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "in_review" => Some(ReviewStatus::InReview),
            "approved" => Some(ReviewStatus::Approved),
            "corrected" => Some(ReviewStatus::Corrected),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReviewStatus::Approved | ReviewStatus::Corrected | ReviewStatus::Rejected
        )
    }
}

/// Decision a reviewer can take on a claimed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Correct,
    Reject,
}

impl ReviewAction {
    /// The terminal status this action transitions the item into.
    pub fn target_status(&self) -> ReviewStatus {
        match self {
            ReviewAction::Approve => ReviewStatus::Approved,
            ReviewAction::Correct => ReviewStatus::Corrected,
            ReviewAction::Reject => ReviewStatus::Rejected,
        }
    }
}

/// An extracted field as stored in the review system. Once `locked` is set
/// the value never changes again, including across re-extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub id: String,
    pub review_item_id: String,
    pub field_name: String,
    pub value: Option<String>,
    pub confidence: f64,
    pub manually_corrected: bool,
    pub corrected_at: Option<DateTime<Utc>>,
    pub corrected_by: Option<String>,
    pub locked: bool,
}

/// One unit of human-review work, tied 1:1 to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub document_id: String,
    pub filename: String,
    pub status: ReviewStatus,
    pub priority: f64,
    /// NULL while pending; set when the item is first claimed.
    pub sla_deadline: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: Vec<ExtractedField>,
}

/// Payload when a reviewer submits a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub action: ReviewAction,
    #[serde(default)]
    pub corrections: BTreeMap<String, String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Filters for queue listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueFilter {
    pub status: Option<ReviewStatus>,
    pub assigned_to: Option<String>,
    pub priority_min: Option<f64>,
}

/// Sort key for queue listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueSort {
    /// priority DESC
    #[default]
    Priority,
    /// sla_deadline ASC
    Sla,
    /// created_at DESC
    Date,
}

impl QueueSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "priority" => Some(QueueSort::Priority),
            "sla" => Some(QueueSort::Sla),
            "date" => Some(QueueSort::Date),
            _ => None,
        }
    }
}

/// One page of queue items plus the total match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePage {
    pub items: Vec<ReviewItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Dashboard statistics, computed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue_depth: i64,
    pub items_reviewed_today: i64,
    pub avg_review_time_seconds: f64,
    pub sla_compliance_percent: f64,
}

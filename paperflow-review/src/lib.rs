//! # paperflow-review
//!
//! The human-review queue service: review-item materialization with
//! field-level locking, atomic claims with SLA deadlines, review
//! submissions, least-loaded auto-assignment, expired-claim release,
//! filtered listing, and dashboard statistics. Every multi-row mutation
//! runs inside one database transaction.

pub mod priority;
pub mod service;

pub use priority::{calculate_priority, calculate_priority_at};
pub use service::ReviewQueueService;

//! # paperflow-pipeline
//!
//! The document-processing pipeline: SHA-256 idempotency, dual-format
//! (parquet + JSON) atomic persistence, the circuit-breaker-guarded
//! extraction adapter, the standard processing DAG, and the worker that
//! drives one document end to end.

pub mod confidence;
pub mod content_hash;
pub mod dag_builder;
pub mod extract;
pub mod idempotency;
pub mod output;
pub mod worker;

pub use content_hash::content_hash;
pub use extract::ExtractionAdapter;
pub use idempotency::IdempotencyStore;
pub use output::OutputWriter;
pub use worker::DocumentWorker;

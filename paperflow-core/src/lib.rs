//! # paperflow-core
//!
//! Core types for the Paperflow document-processing engine: domain models,
//! subsystem error taxonomy, configuration, and the traits implemented by
//! external collaborators (extraction provider, task broker).

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::PaperflowConfig;
pub use errors::{PaperflowError, PaperflowResult};

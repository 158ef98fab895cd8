pub mod audit;
pub mod document;
pub mod invoice;
pub mod review;

pub use audit::{AuditAction, AuditEntry};
pub use document::{mime_for_extension, Document, DocumentStatus, SUPPORTED_EXTENSIONS};
pub use invoice::{
    ConfidentField, ExtractionResult, FieldConfidence, InvoiceData, LineItem, StructuredInvoice,
    RESULT_SCHEMA_VERSION,
};
pub use review::{
    ExtractedField, QueueFilter, QueuePage, QueueSort, QueueStats, ReviewAction, ReviewItem,
    ReviewStatus, ReviewSubmission,
};

//! The extraction-provider boundary.

use async_trait::async_trait;

use crate::errors::PaperflowResult;
use crate::models::StructuredInvoice;

/// Black-box document-understanding provider.
///
/// Implementations receive raw file bytes plus the MIME type and return the
/// structured invoice with whatever per-field confidence the provider
/// supplies. The pipeline wraps every call in the circuit breaker and the
/// extractor rate limiter; implementations should not retry internally.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], mime_type: &str) -> PaperflowResult<StructuredInvoice>;
}

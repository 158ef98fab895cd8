use super::StorageError;

/// Review-queue errors.
///
/// `ClaimConflict` is the 409-equivalent returned when an atomic claim
/// matches zero rows; callers must not retry it.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("review item not available for claim: {item_id}")]
    ClaimConflict { item_id: String },

    #[error("review item not found: {id}")]
    ItemNotFound { id: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

use crate::repository::error::StoreError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("State service is not running.")]
    StateUnavailable,

    #[error("Failed to persist state: {0}")]
    Persistence(#[from] StoreError),
}

use thiserror::Error;

use studiodesk_core::DomainError;

use crate::store::StoreError;

pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Slot claimed by a concurrent request or otherwise not bookable.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The quote was already accepted. Repeating the call is harmless.
    #[error("already booked: {0}")]
    AlreadyBooked(String),

    #[error("no longer available: {0}")]
    Expired(String),

    /// Missing integration credentials. Raised before any write.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The slot is secured but no client could be resolved for the booking.
    #[error("{secured} is secured but client resolution failed: {reason}")]
    ClientResolution { secured: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProvisioningError {
    /// Expected, user-facing outcomes that are not logged as errors.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::Conflict(_)
                | Self::AlreadyBooked(_)
                | Self::Expired(_)
        )
    }
}

impl From<DomainError> for ProvisioningError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvariantViolation(msg) | DomainError::Conflict(msg) => {
                Self::Conflict(msg)
            }
            DomainError::NotFound => Self::NotFound("resource not found".to_string()),
            DomainError::Expired(msg) => Self::Expired(msg),
        }
    }
}

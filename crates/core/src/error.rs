//! Failures raised by the pure studio crates.
//!
//! Billing, contracts, scheduling and crm report rule violations through
//! [`DomainError`]. The provisioning layer maps each variant onto a caller
//! outcome: `Validation`/`InvalidId` are bad input, `Conflict` is a slot or
//! quote someone else already holds, `Expired` is a canceled slot, lost lead
//! or lapsed contract. Store and mail failures never appear here.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Booking details, money amounts or percentages that cannot be accepted
    /// (blank email, negative package total, deposit over 100%).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A record was asked to do something its lifecycle forbids, such as
    /// paying a void invoice or linking a slot that is not booked.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A path or body id that is not a UUID.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Slot already booked or blocked, quote already accepted, contract
    /// already signed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Canceled slot, lost lead, contract past its signing window.
    #[error("expired: {0}")]
    Expired(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn expired(msg: impl Into<String>) -> Self {
        Self::Expired(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}

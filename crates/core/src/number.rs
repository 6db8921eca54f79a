//! Per-tenant document numbers.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Tenant-scoped, strictly increasing job number.
///
/// Stored as an integer; displayed zero-padded to four digits (`#0007`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobNumber(u32);

impl ValueObject for JobNumber {}

impl JobNumber {
    pub const FIRST: JobNumber = JobNumber(1);

    pub fn new(value: u32) -> DomainResult<Self> {
        if value == 0 {
            return Err(DomainError::validation("job numbers start at 1"));
        }
        Ok(Self(value))
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The number after this one.
    pub fn next(&self) -> DomainResult<Self> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or_else(|| DomainError::invariant("job number overflow"))
    }

    /// `0007`
    pub fn padded(&self) -> String {
        format!("{:04}", self.0)
    }
}

impl fmt::Display for JobNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:04}", self.0)
    }
}

//! Booking and quote provisioning.

mod error;
mod outcome;
mod service;

pub use error::{ProvisioningError, ProvisioningResult};
pub use outcome::{
    ProvisionedRecords, ProvisioningIssue, ProvisioningStep, QuoteAcceptance, ReservationOutcome,
    StatusChangeOutcome,
};
pub use service::{InvoiceOptions, MAX_JOB_INSERT_ATTEMPTS, ProvisioningService, ReserveSlot};

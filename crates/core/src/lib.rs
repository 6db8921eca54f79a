//! `studiodesk-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, and the exact money types every other
//! crate computes with.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod number;
pub mod value_object;

pub use entity::{Entity, TenantScoped};
pub use error::{DomainError, DomainResult};
pub use id::{
    BookingEventId, ClientId, ContractId, InvoiceId, JobId, LeadId, PackageId, SlotId, TenantId,
};
pub use money::{Money, Percent};
pub use number::JobNumber;
pub use value_object::ValueObject;

//! CRM domain: clients, leads and jobs.
//!
//! Pure domain logic (no IO). Storage lives in `studiodesk-infra`.

pub mod client;
pub mod job;
pub mod lead;

pub use client::{Client, ClientSource, NewClient, normalize_email, split_name};
pub use job::{Job, JobDraft, JobStatus, SlotEffect};
pub use lead::{Lead, LeadStatus};

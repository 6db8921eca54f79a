//! Billing domain: the money engine and invoice records.
//!
//! Pure, deterministic logic (no IO, no HTTP, no storage). The invoice plan
//! produced here is persisted verbatim by the provisioning workflow.

pub mod due;
pub mod invoice;
pub mod package;
pub mod plan;
pub mod split;

pub use due::{FINAL_PAYMENT_LEAD_DAYS, balance_due_date, deposit_due_date, format_long_date};
pub use invoice::{DEFAULT_CURRENCY, Invoice, InvoiceStatus, InvoiceType};
pub use package::Package;
pub use plan::{InvoicePlanRequest, InvoiceSpec, LineItem, invoice_number, plan_invoices};
pub use split::{ChargeLine, DepositPolicy, split_charges};

//! Persistence ports for the studio domain.
//!
//! Every method that changes state under contention is a *conditional write*:
//! it applies its change only if a predicate on the current row holds, and
//! reports whether it did (`Option`/`bool`). Callers never read first and
//! write second to decide a transition.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryStudioStore;
pub use postgres::PostgresStudioStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use studiodesk_billing::{DEFAULT_CURRENCY, Invoice, Package};
use studiodesk_contracts::Contract;
use studiodesk_core::{
    BookingEventId, ClientId, JobId, JobNumber, LeadId, PackageId, SlotId, TenantId,
};
use studiodesk_crm::{Client, Job, Lead};
use studiodesk_scheduling::{BookingEvent, BookingSlot, SlotClaim, SlotStatus};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write (e.g. duplicate job number).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The operation is not available right now (e.g. counter function missing).
    #[error("store operation unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Bank/PayID details printed on invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub bank_name: Option<String>,
    pub account_name: Option<String>,
    pub bsb: Option<String>,
    pub account_number: Option<String>,
    pub payid_email: Option<String>,
    pub payid_phone: Option<String>,
    pub payment_instructions: Option<String>,
}

/// Per-tenant studio settings and branding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudioProfile {
    pub tenant_id: TenantId,
    pub photographer_name: String,
    pub business_name: Option<String>,
    pub brand_color: Option<String>,
    pub logo_url: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub signature_image: Option<String>,
    pub contract_template: Option<String>,
    pub currency: String,
    pub payment_details: PaymentDetails,
}

impl StudioProfile {
    pub const DEFAULT_BRAND_COLOR: &'static str = "#c47d4a";

    pub fn new(tenant_id: TenantId, photographer_name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            photographer_name: photographer_name.into(),
            business_name: None,
            brand_color: None,
            logo_url: None,
            phone: None,
            email: None,
            website: None,
            signature_image: None,
            contract_template: None,
            currency: DEFAULT_CURRENCY.to_string(),
            payment_details: PaymentDetails::default(),
        }
    }

    /// Business name, falling back to the photographer's name.
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.photographer_name)
    }

    /// Branding fields shared by every outbound email.
    pub fn brand_data(&self) -> Map<String, Value> {
        fn s(v: &Option<String>) -> Value {
            Value::String(v.clone().unwrap_or_default())
        }
        let pd = &self.payment_details;
        let mut data = Map::new();
        data.insert(
            "photographerName".into(),
            Value::String(self.photographer_name.clone()),
        );
        data.insert(
            "businessName".into(),
            Value::String(self.display_name().to_string()),
        );
        data.insert(
            "brandColor".into(),
            Value::String(
                self.brand_color
                    .clone()
                    .unwrap_or_else(|| Self::DEFAULT_BRAND_COLOR.to_string()),
            ),
        );
        data.insert("logoUrl".into(), s(&self.logo_url));
        data.insert("phone".into(), s(&self.phone));
        data.insert("contactEmail".into(), s(&self.email));
        data.insert("website".into(), s(&self.website));
        data.insert("bankName".into(), s(&pd.bank_name));
        data.insert("accountName".into(), s(&pd.account_name));
        data.insert("bsb".into(), s(&pd.bsb));
        data.insert("accountNumber".into(), s(&pd.account_number));
        data.insert("payidEmail".into(), s(&pd.payid_email));
        data.insert("payidPhone".into(), s(&pd.payid_phone));
        data.insert("paymentInstructions".into(), s(&pd.payment_instructions));
        data
    }
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn insert_slots(&self, slots: Vec<BookingSlot>) -> StoreResult<()>;

    /// Public lookup: slot ids are the only key the booking page knows.
    async fn get_slot(&self, slot_id: SlotId) -> StoreResult<Option<BookingSlot>>;

    async fn list_slots(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Vec<BookingSlot>>;

    /// `UPDATE .. SET status = booked, booked_* WHERE id = $1 AND status = available`.
    ///
    /// `None` when the predicate did not hold (no row changed).
    async fn claim_slot(
        &self,
        slot_id: SlotId,
        claim: &SlotClaim,
    ) -> StoreResult<Option<BookingSlot>>;

    /// Back-fill client/job references on a booked slot. `false` if the slot
    /// is no longer booked.
    async fn link_slot(
        &self,
        slot_id: SlotId,
        client_id: Option<ClientId>,
        job_id: Option<JobId>,
    ) -> StoreResult<bool>;

    /// booked -> available, clearing all booking fields.
    async fn release_slot(&self, tenant_id: TenantId, slot_id: SlotId) -> StoreResult<bool>;

    /// Move to `to` only if the current status is one of `from`.
    async fn transition_slot(
        &self,
        tenant_id: TenantId,
        slot_id: SlotId,
        from: &[SlotStatus],
        to: SlotStatus,
    ) -> StoreResult<Option<BookingSlot>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_event(&self, event: BookingEvent) -> StoreResult<()>;

    async fn get_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Option<BookingEvent>>;

    /// Delete an event and cascade to its slots. Returns the number of slots
    /// removed, or `None` if the event did not exist.
    async fn delete_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Option<u64>>;

    async fn insert_package(&self, package: Package) -> StoreResult<()>;

    async fn get_package(
        &self,
        tenant_id: TenantId,
        package_id: PackageId,
    ) -> StoreResult<Option<Package>>;

    async fn upsert_studio_profile(&self, profile: StudioProfile) -> StoreResult<()>;

    async fn get_studio_profile(&self, tenant_id: TenantId) -> StoreResult<Option<StudioProfile>>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Lookup by the normalised `(tenant_id, email)` key.
    async fn find_client_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> StoreResult<Option<Client>>;

    async fn get_client(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> StoreResult<Option<Client>>;

    /// `UniqueViolation` when the email already exists for the tenant.
    async fn insert_client(&self, client: Client) -> StoreResult<()>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomic per-tenant counter: increment and return. A tenant's first
    /// call starts just above its highest stored job number.
    async fn increment_job_counter(&self, tenant_id: TenantId) -> StoreResult<JobNumber>;

    /// Highest job number issued for the tenant (non-atomic fallback input).
    async fn max_job_number(&self, tenant_id: TenantId) -> StoreResult<Option<JobNumber>>;

    /// `UniqueViolation` when `(tenant_id, job_number)` is taken.
    async fn insert_job(&self, job: Job) -> StoreResult<()>;

    async fn get_job(&self, tenant_id: TenantId, job_id: JobId) -> StoreResult<Option<Job>>;

    async fn update_job(&self, job: &Job) -> StoreResult<()>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Insert all or none.
    async fn insert_invoices(&self, invoices: Vec<Invoice>) -> StoreResult<()>;

    async fn list_invoices_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> StoreResult<Vec<Invoice>>;
}

#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn insert_contract(&self, contract: Contract) -> StoreResult<()>;

    async fn get_contract_by_token(&self, token: &str) -> StoreResult<Option<Contract>>;

    async fn contracts_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> StoreResult<Vec<Contract>>;

    async fn update_contract(&self, contract: &Contract) -> StoreResult<()>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn insert_lead(&self, lead: Lead) -> StoreResult<()>;

    async fn get_lead_by_token(&self, token: &str) -> StoreResult<Option<Lead>>;

    /// `UPDATE leads SET status = booked WHERE id = $1 AND status NOT IN (booked, lost)`.
    async fn accept_lead(&self, lead_id: LeadId, at: DateTime<Utc>) -> StoreResult<Option<Lead>>;
}

/// Everything the provisioning workflow needs from storage.
pub trait StudioStore:
    SlotStore + CatalogStore + ClientStore + JobStore + InvoiceStore + ContractStore + LeadStore
{
}

impl<T> StudioStore for T where
    T: SlotStore + CatalogStore + ClientStore + JobStore + InvoiceStore + ContractStore + LeadStore
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_data_falls_back_to_photographer_name() {
        let mut profile = StudioProfile::new(TenantId::new(), "Alex Reed");
        assert_eq!(profile.display_name(), "Alex Reed");
        let data = profile.brand_data();
        assert_eq!(data["businessName"], "Alex Reed");
        assert_eq!(data["brandColor"], StudioProfile::DEFAULT_BRAND_COLOR);
        assert_eq!(data["bsb"], "");

        profile.business_name = Some("Lumen Studio".to_string());
        assert_eq!(profile.brand_data()["businessName"], "Lumen Studio");
    }
}

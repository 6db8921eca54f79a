//! In-memory studio store for tests/dev.
//!
//! All state lives behind one `RwLock`, so every conditional write is a single
//! critical section: the predicate check and the mutation happen under the
//! same write guard, the in-process equivalent of `UPDATE .. WHERE .. RETURNING`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use studiodesk_billing::{Invoice, Package};
use studiodesk_contracts::Contract;
use studiodesk_core::{
    BookingEventId, ClientId, ContractId, InvoiceId, JobId, JobNumber, LeadId, PackageId, SlotId,
    TenantId, TenantScoped,
};
use studiodesk_crm::{Client, Job, Lead, normalize_email};
use studiodesk_scheduling::{BookingEvent, BookingSlot, SlotClaim, SlotStatus};

use super::{
    CatalogStore, ClientStore, ContractStore, InvoiceStore, JobStore, LeadStore, SlotStore,
    StoreError, StoreResult, StudioProfile,
};

#[derive(Debug, Default)]
struct State {
    events: HashMap<BookingEventId, BookingEvent>,
    slots: HashMap<SlotId, BookingSlot>,
    packages: HashMap<PackageId, Package>,
    profiles: HashMap<TenantId, StudioProfile>,
    clients: HashMap<ClientId, Client>,
    jobs: HashMap<JobId, Job>,
    job_counters: HashMap<TenantId, u32>,
    invoices: HashMap<InvoiceId, Invoice>,
    contracts: HashMap<ContractId, Contract>,
    leads: HashMap<LeadId, Lead>,
}

#[derive(Debug, Default)]
pub struct InMemoryStudioStore {
    state: RwLock<State>,
    faults: Mutex<HashSet<String>>,
}

impl InMemoryStudioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` (a trait method name) fail with
    /// `StoreError::Unavailable` until [`Self::restore_operation`].
    pub fn fail_operation(&self, operation: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(operation.to_string());
        }
    }

    pub fn restore_operation(&self, operation: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.remove(operation);
        }
    }

    /// All jobs of a tenant, ordered by job number.
    pub fn jobs_for_tenant(&self, tenant_id: TenantId) -> Vec<Job> {
        let Ok(state) = self.state.read() else {
            return vec![];
        };
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.belongs_to(tenant_id))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.job_number);
        jobs
    }

    pub fn invoices_for_tenant(&self, tenant_id: TenantId) -> Vec<Invoice> {
        let Ok(state) = self.state.read() else {
            return vec![];
        };
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.belongs_to(tenant_id))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.invoice_number.cmp(&b.invoice_number));
        invoices
    }

    pub fn clients_for_tenant(&self, tenant_id: TenantId) -> Vec<Client> {
        let Ok(state) = self.state.read() else {
            return vec![];
        };
        state
            .clients
            .values()
            .filter(|c| c.belongs_to(tenant_id))
            .cloned()
            .collect()
    }

    fn check(&self, operation: &str) -> StoreResult<()> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::Backend("fault registry poisoned".into()))?;
        if faults.contains(operation) {
            return Err(StoreError::Unavailable(format!("{operation} is unavailable")));
        }
        Ok(())
    }

    fn read(&self, operation: &str) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.check(operation)?;
        self.state
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".into()))
    }

    fn write(&self, operation: &str) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.check(operation)?;
        self.state
            .write()
            .map_err(|_| StoreError::Backend("state lock poisoned".into()))
    }
}

#[async_trait]
impl SlotStore for InMemoryStudioStore {
    async fn insert_slots(&self, slots: Vec<BookingSlot>) -> StoreResult<()> {
        let mut state = self.write("insert_slots")?;
        for slot in slots {
            state.slots.insert(slot.id, slot);
        }
        Ok(())
    }

    async fn get_slot(&self, slot_id: SlotId) -> StoreResult<Option<BookingSlot>> {
        let state = self.read("get_slot")?;
        Ok(state.slots.get(&slot_id).cloned())
    }

    async fn list_slots(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Vec<BookingSlot>> {
        let state = self.read("list_slots")?;
        let mut slots: Vec<BookingSlot> = state
            .slots
            .values()
            .filter(|s| s.belongs_to(tenant_id) && s.event_id == event_id)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.date, s.start_time));
        Ok(slots)
    }

    async fn claim_slot(
        &self,
        slot_id: SlotId,
        claim: &SlotClaim,
    ) -> StoreResult<Option<BookingSlot>> {
        let mut state = self.write("claim_slot")?;
        let Some(slot) = state.slots.get_mut(&slot_id) else {
            return Ok(None);
        };
        if !slot.is_available() {
            return Ok(None);
        }
        slot.apply_claim(claim)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(slot.clone()))
    }

    async fn link_slot(
        &self,
        slot_id: SlotId,
        client_id: Option<ClientId>,
        job_id: Option<JobId>,
    ) -> StoreResult<bool> {
        let mut state = self.write("link_slot")?;
        match state.slots.get_mut(&slot_id) {
            Some(slot) if slot.status == SlotStatus::Booked => {
                slot.link(client_id, job_id)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_slot(&self, tenant_id: TenantId, slot_id: SlotId) -> StoreResult<bool> {
        let mut state = self.write("release_slot")?;
        match state.slots.get_mut(&slot_id) {
            Some(slot) if slot.belongs_to(tenant_id) => Ok(slot.release()),
            _ => Ok(false),
        }
    }

    async fn transition_slot(
        &self,
        tenant_id: TenantId,
        slot_id: SlotId,
        from: &[SlotStatus],
        to: SlotStatus,
    ) -> StoreResult<Option<BookingSlot>> {
        let mut state = self.write("transition_slot")?;
        match state.slots.get_mut(&slot_id) {
            Some(slot) if slot.belongs_to(tenant_id) && from.contains(&slot.status) => {
                slot.status = to;
                Ok(Some(slot.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryStudioStore {
    async fn insert_event(&self, event: BookingEvent) -> StoreResult<()> {
        let mut state = self.write("insert_event")?;
        state.events.insert(event.id, event);
        Ok(())
    }

    async fn get_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Option<BookingEvent>> {
        let state = self.read("get_event")?;
        Ok(state
            .events
            .get(&event_id)
            .filter(|e| e.belongs_to(tenant_id))
            .cloned())
    }

    async fn delete_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Option<u64>> {
        let mut state = self.write("delete_event")?;
        let owned = state
            .events
            .get(&event_id)
            .is_some_and(|e| e.belongs_to(tenant_id));
        if !owned {
            return Ok(None);
        }
        state.events.remove(&event_id);

        let doomed: Vec<SlotId> = state
            .slots
            .values()
            .filter(|s| s.event_id == event_id)
            .map(|s| s.id)
            .collect();
        for slot_id in &doomed {
            state.slots.remove(slot_id);
        }
        // jobs keep existing; only their slot link goes away
        for job in state.jobs.values_mut() {
            if job.booking_slot_id.is_some_and(|id| doomed.contains(&id)) {
                job.booking_slot_id = None;
            }
        }
        Ok(Some(doomed.len() as u64))
    }

    async fn insert_package(&self, package: Package) -> StoreResult<()> {
        let mut state = self.write("insert_package")?;
        state.packages.insert(package.id, package);
        Ok(())
    }

    async fn get_package(
        &self,
        tenant_id: TenantId,
        package_id: PackageId,
    ) -> StoreResult<Option<Package>> {
        let state = self.read("get_package")?;
        Ok(state
            .packages
            .get(&package_id)
            .filter(|p| p.belongs_to(tenant_id))
            .cloned())
    }

    async fn upsert_studio_profile(&self, profile: StudioProfile) -> StoreResult<()> {
        let mut state = self.write("upsert_studio_profile")?;
        state.profiles.insert(profile.tenant_id, profile);
        Ok(())
    }

    async fn get_studio_profile(&self, tenant_id: TenantId) -> StoreResult<Option<StudioProfile>> {
        let state = self.read("get_studio_profile")?;
        Ok(state.profiles.get(&tenant_id).cloned())
    }
}

#[async_trait]
impl ClientStore for InMemoryStudioStore {
    async fn find_client_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> StoreResult<Option<Client>> {
        let state = self.read("find_client_by_email")?;
        let key = normalize_email(email);
        Ok(state
            .clients
            .values()
            .find(|c| c.belongs_to(tenant_id) && c.email.as_deref() == Some(key.as_str()))
            .cloned())
    }

    async fn get_client(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> StoreResult<Option<Client>> {
        let state = self.read("get_client")?;
        Ok(state
            .clients
            .get(&client_id)
            .filter(|c| c.belongs_to(tenant_id))
            .cloned())
    }

    async fn insert_client(&self, client: Client) -> StoreResult<()> {
        let mut state = self.write("insert_client")?;
        if let Some(email) = client.email.as_deref() {
            let taken = state
                .clients
                .values()
                .any(|c| c.belongs_to(client.tenant_id) && c.email.as_deref() == Some(email));
            if taken {
                return Err(StoreError::UniqueViolation(format!(
                    "client email {email} already exists"
                )));
            }
        }
        state.clients.insert(client.id, client);
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryStudioStore {
    async fn increment_job_counter(&self, tenant_id: TenantId) -> StoreResult<JobNumber> {
        let mut state = self.write("increment_job_counter")?;
        let highest = state
            .jobs
            .values()
            .filter(|j| j.belongs_to(tenant_id))
            .map(|j| j.job_number.value())
            .max()
            .unwrap_or(0);
        let counter = state.job_counters.entry(tenant_id).or_insert(highest);
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("job counter overflow".into()))?;
        JobNumber::new(*counter).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn max_job_number(&self, tenant_id: TenantId) -> StoreResult<Option<JobNumber>> {
        let state = self.read("max_job_number")?;
        Ok(state
            .jobs
            .values()
            .filter(|j| j.belongs_to(tenant_id))
            .map(|j| j.job_number)
            .max())
    }

    async fn insert_job(&self, job: Job) -> StoreResult<()> {
        let mut state = self.write("insert_job")?;
        let taken = state
            .jobs
            .values()
            .any(|j| j.belongs_to(job.tenant_id) && j.job_number == job.job_number);
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "job number {} already issued",
                job.job_number
            )));
        }
        state.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, tenant_id: TenantId, job_id: JobId) -> StoreResult<Option<Job>> {
        let state = self.read("get_job")?;
        Ok(state
            .jobs
            .get(&job_id)
            .filter(|j| j.belongs_to(tenant_id))
            .cloned())
    }

    async fn update_job(&self, job: &Job) -> StoreResult<()> {
        let mut state = self.write("update_job")?;
        match state.jobs.get_mut(&job.id) {
            Some(existing) if existing.belongs_to(job.tenant_id) => {
                *existing = job.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!("job {}", job.id))),
        }
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStudioStore {
    async fn insert_invoices(&self, invoices: Vec<Invoice>) -> StoreResult<()> {
        let mut state = self.write("insert_invoices")?;
        for invoice in &invoices {
            let taken = state.invoices.values().any(|i| {
                i.belongs_to(invoice.tenant_id) && i.invoice_number == invoice.invoice_number
            });
            if taken {
                return Err(StoreError::UniqueViolation(format!(
                    "invoice number {} already exists",
                    invoice.invoice_number
                )));
            }
        }
        for invoice in invoices {
            state.invoices.insert(invoice.id, invoice);
        }
        Ok(())
    }

    async fn list_invoices_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> StoreResult<Vec<Invoice>> {
        let state = self.read("list_invoices_for_job")?;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| i.belongs_to(tenant_id) && i.job_id == Some(job_id))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.invoice_number.cmp(&b.invoice_number));
        Ok(invoices)
    }
}

#[async_trait]
impl ContractStore for InMemoryStudioStore {
    async fn insert_contract(&self, contract: Contract) -> StoreResult<()> {
        let mut state = self.write("insert_contract")?;
        let duplicate = state.contracts.values().any(|c| {
            c.signing_token == contract.signing_token
                || (contract.job_id.is_some() && c.job_id == contract.job_id)
        });
        if duplicate {
            return Err(StoreError::UniqueViolation(
                "contract already exists for this job or token".into(),
            ));
        }
        state.contracts.insert(contract.id, contract);
        Ok(())
    }

    async fn get_contract_by_token(&self, token: &str) -> StoreResult<Option<Contract>> {
        let state = self.read("get_contract_by_token")?;
        Ok(state
            .contracts
            .values()
            .find(|c| c.signing_token == token)
            .cloned())
    }

    async fn contracts_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> StoreResult<Vec<Contract>> {
        let state = self.read("contracts_for_job")?;
        Ok(state
            .contracts
            .values()
            .filter(|c| c.belongs_to(tenant_id) && c.job_id == Some(job_id))
            .cloned()
            .collect())
    }

    async fn update_contract(&self, contract: &Contract) -> StoreResult<()> {
        let mut state = self.write("update_contract")?;
        match state.contracts.get_mut(&contract.id) {
            Some(existing) => {
                *existing = contract.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("contract {}", contract.id))),
        }
    }
}

#[async_trait]
impl LeadStore for InMemoryStudioStore {
    async fn insert_lead(&self, lead: Lead) -> StoreResult<()> {
        let mut state = self.write("insert_lead")?;
        state.leads.insert(lead.id, lead);
        Ok(())
    }

    async fn get_lead_by_token(&self, token: &str) -> StoreResult<Option<Lead>> {
        let state = self.read("get_lead_by_token")?;
        Ok(state
            .leads
            .values()
            .find(|l| l.quote_token.as_deref() == Some(token))
            .cloned())
    }

    async fn accept_lead(&self, lead_id: LeadId, at: DateTime<Utc>) -> StoreResult<Option<Lead>> {
        let mut state = self.write("accept_lead")?;
        match state.leads.get_mut(&lead_id) {
            Some(lead) if lead.status.accepts_quote() => {
                lead.accept_quote(at)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(Some(lead.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use studiodesk_scheduling::SlotWindow;

    fn slot(tenant_id: TenantId) -> BookingSlot {
        BookingSlot::available(
            SlotId::new(),
            tenant_id,
            BookingEventId::new(),
            SlotWindow {
                date: NaiveDate::from_ymd_opt(2026, 4, 4).unwrap(),
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn claim_is_conditional() {
        let store = InMemoryStudioStore::new();
        let s = slot(TenantId::new());
        store.insert_slots(vec![s.clone()]).await.unwrap();

        let claim = SlotClaim::new("A", "a@example.com", None, Utc::now()).unwrap();
        assert!(store.claim_slot(s.id, &claim).await.unwrap().is_some());
        assert!(store.claim_slot(s.id, &claim).await.unwrap().is_none());
        assert!(store.claim_slot(SlotId::new(), &claim).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counter_is_per_tenant_and_faults_are_injectable() {
        let store = InMemoryStudioStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        assert_eq!(store.increment_job_counter(a).await.unwrap().value(), 1);
        assert_eq!(store.increment_job_counter(a).await.unwrap().value(), 2);
        assert_eq!(store.increment_job_counter(b).await.unwrap().value(), 1);

        store.fail_operation("increment_job_counter");
        assert!(matches!(
            store.increment_job_counter(a).await,
            Err(StoreError::Unavailable(_))
        ));
        store.restore_operation("increment_job_counter");
        assert_eq!(store.increment_job_counter(a).await.unwrap().value(), 3);
    }

    #[tokio::test]
    async fn counter_starts_above_jobs_numbered_before_it_existed() {
        let store = InMemoryStudioStore::new();
        let tenant = TenantId::new();
        for n in 1..=5 {
            let draft = studiodesk_crm::JobDraft {
                tenant_id: tenant,
                client_id: None,
                lead_id: None,
                booking_slot_id: None,
                title: format!("Imported {n}"),
                job_type: None,
                date: None,
                time: None,
                end_time: None,
                location: None,
                package_id: None,
                package_name: None,
                package_amount: None,
                included_images: None,
                notes: None,
            };
            let job = Job::create(JobId::new(), JobNumber::new(n).unwrap(), draft, Utc::now());
            store.insert_job(job).await.unwrap();
        }

        assert_eq!(store.increment_job_counter(tenant).await.unwrap().value(), 6);
        assert_eq!(store.increment_job_counter(tenant).await.unwrap().value(), 7);
        assert_eq!(
            store.increment_job_counter(TenantId::new()).await.unwrap().value(),
            1
        );
    }

    #[tokio::test]
    async fn tenants_cannot_see_each_others_slots() {
        let store = InMemoryStudioStore::new();
        let owner = TenantId::new();
        let s = slot(owner);
        store.insert_slots(vec![s.clone()]).await.unwrap();

        assert!(!store.release_slot(TenantId::new(), s.id).await.unwrap());
        assert!(store
            .transition_slot(TenantId::new(), s.id, &[SlotStatus::Available], SlotStatus::Blocked)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .transition_slot(owner, s.id, &[SlotStatus::Available], SlotStatus::Blocked)
            .await
            .unwrap()
            .is_some());
    }
}

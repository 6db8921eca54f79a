//! The provisioning workflow.
//!
//! Two entry points (slot reservation, quote acceptance) secure their primary
//! resource with one conditional write, then provision client, job,
//! invoices, contract and notifications. Only failures up to and including
//! that write abort the call. A booking whose client cannot be resolved is
//! surfaced as `ClientResolution`. A quote never aborts on its client: the
//! job and documents are created without one. Every other step is
//! best-effort and recorded in the outcome's `issues`.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use studiodesk_billing::{
    DEFAULT_CURRENCY, DepositPolicy, Invoice, InvoicePlanRequest, InvoiceType, Package, format_long_date,
    plan_invoices,
};
use studiodesk_contracts::{
    ClientSignature, Contract, ContractTerms, DEFAULT_CONTRACT_TEMPLATE, DepositTerms,
    IssueContract, TO_BE_CONFIRMED,
};
use studiodesk_core::{
    BookingEventId, ClientId, ContractId, DomainError, InvoiceId, JobId, Money, PackageId, Percent,
    SlotId, TenantId,
};
use studiodesk_crm::{Client, ClientSource, Job, JobDraft, JobStatus, Lead, NewClient, SlotEffect};
use studiodesk_scheduling::{AvailabilityWindow, BookingEvent, BookingSlot, SlotClaim};

use crate::config::ProvisioningSettings;
use crate::notify::{
    DelayedDispatcher, NotificationDispatcher, NotificationPlan, NotificationRequest,
    NotificationTemplate, flush,
};
use crate::sequencer::next_job_number;
use crate::slots::SlotAllocator;
use crate::store::{StoreError, StudioProfile, StudioStore};

use super::error::{ProvisioningError, ProvisioningResult};
use super::outcome::{
    ProvisionedRecords, ProvisioningStep, QuoteAcceptance, ReservationOutcome,
    StatusChangeOutcome,
};

/// Job inserts retried after a job-number collision.
pub const MAX_JOB_INSERT_ATTEMPTS: u32 = 3;

const BOOKING_JOB_TYPE: &str = "Mini Session";
const QUOTE_JOB_TYPE: &str = "Photography";
const QUOTE_JOB_TITLE: &str = "Photography Session";
const SESSION_LABEL: &str = "Session";
const FALLBACK_STUDIO_NAME: &str = "Your photographer";
const UNNAMED_CLIENT: &str = "Client";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveSlot {
    pub slot_id: SlotId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Overrides for manual invoice generation. A job's linked package always
/// decides the deposit policy; these apply only to custom jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceOptions {
    pub requires_deposit: Option<bool>,
    pub deposit_percent: Option<Percent>,
    pub tax_rate: Option<Percent>,
}

/// What a confirmation email describes.
struct SessionSummary {
    title: String,
    date: Option<NaiveDate>,
    location: Option<String>,
}

#[derive(Clone)]
pub struct ProvisioningService {
    store: Arc<dyn StudioStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    followups: Arc<dyn DelayedDispatcher>,
    settings: ProvisioningSettings,
}

impl ProvisioningService {
    pub fn new(
        store: Arc<dyn StudioStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        followups: Arc<dyn DelayedDispatcher>,
        settings: ProvisioningSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            followups,
            settings,
        }
    }

    pub fn settings(&self) -> &ProvisioningSettings {
        &self.settings
    }

    fn slots(&self) -> SlotAllocator<'_, dyn StudioStore> {
        SlotAllocator::new(&*self.store)
    }

    /// Integration credentials must be present before anything is written.
    fn preflight(&self) -> ProvisioningResult<()> {
        if !self.notifier.is_configured() {
            return Err(ProvisioningError::Configuration(
                "email notification service is not configured".to_string(),
            ));
        }
        if !self.followups.is_configured() {
            return Err(ProvisioningError::Configuration(
                "follow-up notification service is not configured".to_string(),
            ));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Entry A: public slot booking
    // ---------------------------------------------------------------------

    pub async fn reserve_slot(&self, req: ReserveSlot) -> ProvisioningResult<ReservationOutcome> {
        self.preflight()?;
        let now = Utc::now();
        let claim = SlotClaim::new(&req.name, &req.email, req.phone.as_deref(), now)?;

        let slot = self
            .slots()
            .reserve(req.slot_id, &claim)
            .await
            .inspect_err(|err| log_rejection("reserve_slot", err))?;

        let tenant_id = slot.tenant_id;
        let secured = format!("slot {}", slot.id);
        let mut records = ProvisionedRecords::default();

        let event = self.load_event(&slot, &secured, &mut records).await;
        let package = match event.as_ref().and_then(|e| e.package_id) {
            Some(package_id) => {
                self.load_package(tenant_id, package_id, &secured, &mut records)
                    .await
            }
            None => None,
        };
        let profile = self.load_profile(tenant_id, &secured, &mut records).await;

        let client = self
            .resolve_client(
                tenant_id,
                &claim.name,
                &claim.email,
                claim.phone.clone(),
                ClientSource::Booking,
            )
            .await
            .map_err(|err| client_resolution_failed(tenant_id, &secured, err))?;
        records.client_id = Some(client.id);

        let mut job = None;
        let mut invoices = Vec::new();
        let mut deposit = None;
        if let Some(event) = event.as_ref().filter(|e| e.auto_create_job) {
            let draft = JobDraft {
                tenant_id,
                client_id: Some(client.id),
                lead_id: None,
                booking_slot_id: Some(slot.id),
                title: event.title.clone(),
                job_type: Some(BOOKING_JOB_TYPE.to_string()),
                date: Some(slot.date),
                time: Some(slot.start_time),
                end_time: Some(slot.end_time),
                location: event.location.clone(),
                package_id: event.package_id,
                package_name: Some(
                    package
                        .as_ref()
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| event.title.clone()),
                ),
                package_amount: event.price(package.as_ref().map(|p| p.price)),
                included_images: package.as_ref().and_then(|p| p.included_images),
                notes: Some(format!(
                    "Booked via online booking page. Client: {} ({})",
                    claim.name, claim.email
                )),
            };
            job = self.create_job(draft, &secured, &mut records).await;

            if let Some(job) = job.as_ref().filter(|_| event.auto_create_invoice) {
                let package_label = package
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| SESSION_LABEL.to_string());
                (invoices, deposit) = self
                    .auto_invoices(
                        &profile,
                        Some(client.id),
                        job,
                        package.as_ref(),
                        Some(package_label),
                        &secured,
                        &mut records,
                    )
                    .await;
            }
        }

        let job_id = job.as_ref().map(|j| j.id);
        match self.slots().link(slot.id, Some(client.id), job_id).await {
            Ok(true) => {}
            Ok(false) => record_issue(
                &mut records,
                tenant_id,
                &secured,
                ProvisioningStep::LinkSlot,
                "slot is no longer booked",
            ),
            Err(err) => {
                record_issue(&mut records, tenant_id, &secured, ProvisioningStep::LinkSlot, err)
            }
        }

        let contract = match job.as_ref() {
            Some(job) => {
                self.create_contract(&profile, Some(&client), job, deposit, &secured, &mut records)
                    .await
            }
            None => None,
        };

        let summary = SessionSummary {
            title: job
                .as_ref()
                .map(|j| j.title.clone())
                .or_else(|| event.as_ref().map(|e| e.title.clone()))
                .unwrap_or_else(|| SESSION_LABEL.to_string()),
            date: Some(slot.date),
            location: event.as_ref().and_then(|e| e.location.clone()),
        };
        self.notify(&profile, Some(&client), &summary, &invoices, contract.as_ref(), &mut records)
            .await;

        info!(
            tenant_id = %tenant_id,
            slot_id = %slot.id,
            client_id = %client.id,
            job_id = ?job_id,
            issues = records.issues.len(),
            "slot reservation provisioned"
        );
        Ok(ReservationOutcome {
            slot_id: slot.id,
            tenant_id,
            records,
        })
    }

    // ---------------------------------------------------------------------
    // Entry B: quote acceptance
    // ---------------------------------------------------------------------

    pub async fn accept_quote(&self, token: &str) -> ProvisioningResult<QuoteAcceptance> {
        self.preflight()?;
        let token = token.trim();
        if token.is_empty() {
            return Err(ProvisioningError::Validation(
                "quote token is required".to_string(),
            ));
        }

        let lead = self
            .store
            .get_lead_by_token(token)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound("quote not found".to_string()))?;
        lead.check_quote_acceptable()
            .map_err(quote_rejection)
            .inspect_err(|err| log_rejection("accept_quote", err))?;

        let now = Utc::now();
        let Some(lead) = self.store.accept_lead(lead.id, now).await? else {
            // lost a race with another acceptance (or a status change)
            let err = match self.store.get_lead_by_token(token).await? {
                Some(current) => current
                    .check_quote_acceptable()
                    .err()
                    .map(quote_rejection)
                    .unwrap_or_else(|| {
                        ProvisioningError::Conflict("quote could not be accepted".to_string())
                    }),
                None => ProvisioningError::NotFound("quote not found".to_string()),
            };
            log_rejection("accept_quote", &err);
            return Err(err);
        };

        let tenant_id = lead.tenant_id;
        let secured = format!("lead {}", lead.id);
        let mut records = ProvisionedRecords::default();

        let client = self.quote_client(&lead, &secured, &mut records).await;
        records.client_id = client.as_ref().map(|c| c.id);

        let package = match lead.quoted_package_id {
            Some(package_id) => {
                self.load_package(tenant_id, package_id, &secured, &mut records)
                    .await
            }
            None => None,
        };
        let profile = self.load_profile(tenant_id, &secured, &mut records).await;

        let amount = lead.quote_amount(package.as_ref().map(|p| p.price));
        let title = package
            .as_ref()
            .map(|p| p.name.clone())
            .or_else(|| lead.job_type.clone())
            .unwrap_or_else(|| QUOTE_JOB_TITLE.to_string());
        let draft = JobDraft {
            tenant_id,
            client_id: records.client_id,
            lead_id: Some(lead.id),
            booking_slot_id: None,
            title: title.clone(),
            job_type: Some(
                lead.job_type
                    .clone()
                    .unwrap_or_else(|| QUOTE_JOB_TYPE.to_string()),
            ),
            date: lead.preferred_date,
            time: None,
            end_time: None,
            location: lead.location.clone(),
            package_id: lead.quoted_package_id,
            package_name: package.as_ref().map(|p| p.name.clone()),
            package_amount: Some(amount).filter(|a| a.is_positive()),
            included_images: package.as_ref().and_then(|p| p.included_images),
            notes: Some(format!(
                "Auto-created from accepted quote. Lead source: {}",
                lead.source.as_deref().unwrap_or("direct")
            )),
        };
        let job = self.create_job(draft, &secured, &mut records).await;

        let mut invoices = Vec::new();
        let mut deposit = None;
        let mut contract = None;
        if let Some(job) = job.as_ref() {
            (invoices, deposit) = self
                .auto_invoices(
                    &profile,
                    records.client_id,
                    job,
                    package.as_ref(),
                    package.as_ref().map(|p| p.name.clone()),
                    &secured,
                    &mut records,
                )
                .await;
            contract = self
                .create_contract(&profile, client.as_ref(), job, deposit, &secured, &mut records)
                .await;
        }

        let summary = SessionSummary {
            title,
            date: lead.preferred_date,
            location: lead.location.clone(),
        };
        self.notify(&profile, client.as_ref(), &summary, &invoices, contract.as_ref(), &mut records)
            .await;

        info!(
            tenant_id = %tenant_id,
            lead_id = %lead.id,
            job_id = ?records.job_id,
            issues = records.issues.len(),
            "quote acceptance provisioned"
        );
        Ok(QuoteAcceptance {
            lead_id: lead.id,
            tenant_id,
            records,
        })
    }

    // ---------------------------------------------------------------------
    // Internal trigger: manual invoice generation
    // ---------------------------------------------------------------------

    pub async fn generate_invoices_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        options: InvoiceOptions,
    ) -> ProvisioningResult<Vec<InvoiceId>> {
        let job = self
            .store
            .get_job(tenant_id, job_id)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("job {job_id}")))?;

        if !self
            .store
            .list_invoices_for_job(tenant_id, job_id)
            .await?
            .is_empty()
        {
            return Err(ProvisioningError::Conflict(format!(
                "invoices already exist for job {}",
                job.job_number
            )));
        }

        let total = job
            .package_amount
            .filter(|a| a.is_positive())
            .ok_or_else(|| {
                ProvisioningError::Validation("job has no package amount to invoice".to_string())
            })?;

        let package = match job.package_id {
            Some(package_id) => self.store.get_package(tenant_id, package_id).await?,
            None => None,
        };
        let policy = match package.as_ref() {
            Some(package) => self.package_policy(Some(package))?,
            None if options.requires_deposit.unwrap_or(false) => DepositPolicy::deposit(
                options
                    .deposit_percent
                    .unwrap_or(self.settings.default_deposit_percent),
            )?,
            None => DepositPolicy::single_invoice(),
        };
        let tax_rate = options.tax_rate.unwrap_or(self.settings.tax_rate);
        let currency = self
            .store
            .get_studio_profile(tenant_id)
            .await?
            .map(|p| p.currency)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let invoices = self
            .persist_invoices(
                &job,
                job.client_id,
                total,
                policy,
                tax_rate,
                job.package_name.clone(),
                &currency,
            )
            .await?;
        info!(
            tenant_id = %tenant_id,
            job_id = %job_id,
            count = invoices.len(),
            "invoices generated for job"
        );
        Ok(invoices.iter().map(|i| i.id).collect())
    }

    // ---------------------------------------------------------------------
    // Job lifecycle
    // ---------------------------------------------------------------------

    /// Change a job's status, releasing its slot on cancel and re-claiming
    /// it on restore.
    ///
    /// The stored job and its slot never disagree about who holds the slot:
    /// a cancel is persisted before the slot is freed, a restore claims the
    /// slot before it is persisted, and each side is rolled back when the
    /// other fails.
    pub async fn change_job_status(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        status: JobStatus,
    ) -> ProvisioningResult<StatusChangeOutcome> {
        let mut job = self
            .store
            .get_job(tenant_id, job_id)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("job {job_id}")))?;
        let previous = job.clone();

        let mut outcome = StatusChangeOutcome {
            job: job.clone(),
            slot_released: false,
            slot_reclaimed: false,
            slot_detached: None,
        };

        match job.change_status(status) {
            SlotEffect::None => self.store.update_job(&job).await?,
            SlotEffect::Release(slot_id) => {
                self.store.update_job(&job).await?;
                match self.slots().release(tenant_id, slot_id).await {
                    Ok(released) => outcome.slot_released = released,
                    Err(err) => {
                        self.restore_job(&previous, "slot release failed").await;
                        return Err(err);
                    }
                }
            }
            SlotEffect::Reclaim(slot_id) => {
                let claim = self.reclaim_claim(&job).await?;
                match self.slots().reclaim(tenant_id, slot_id, claim).await? {
                    Some(_) => outcome.slot_reclaimed = true,
                    None => {
                        warn!(
                            tenant_id = %tenant_id,
                            job_id = %job_id,
                            slot_id = %slot_id,
                            "slot taken while job was canceled; restoring without it"
                        );
                        outcome.slot_detached = job.detach_slot();
                    }
                }
                if let Err(err) = self.store.update_job(&job).await {
                    if outcome.slot_reclaimed {
                        self.give_back_slot(tenant_id, slot_id).await;
                    }
                    return Err(err.into());
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            job_id = %job_id,
            status = status.as_str(),
            "job status changed"
        );
        outcome.job = job;
        Ok(outcome)
    }

    /// Put a job back as it was before a status change that could not finish.
    async fn restore_job(&self, previous: &Job, reason: &str) {
        if let Err(err) = self.store.update_job(previous).await {
            error!(
                tenant_id = %previous.tenant_id,
                job_id = %previous.id,
                reason,
                error = %err,
                "job status could not be rolled back"
            );
        }
    }

    /// Free a slot claimed for a restore that could not be persisted.
    async fn give_back_slot(&self, tenant_id: TenantId, slot_id: SlotId) {
        if let Err(err) = self.slots().release(tenant_id, slot_id).await {
            error!(
                tenant_id = %tenant_id,
                slot_id = %slot_id,
                error = %err,
                "reclaimed slot could not be released after a failed restore"
            );
        }
    }

    async fn reclaim_claim(&self, job: &Job) -> ProvisioningResult<SlotClaim> {
        let client = match job.client_id {
            Some(client_id) => self.store.get_client(job.tenant_id, client_id).await?,
            None => None,
        };
        let (name, email) = match client.as_ref() {
            Some(c) => (c.full_name(), c.email.clone().unwrap_or_default()),
            None => (job.title.clone(), String::new()),
        };
        Ok(SlotClaim {
            name,
            email,
            phone: client.and_then(|c| c.phone),
            booked_at: Utc::now(),
            client_id: job.client_id,
            job_id: Some(job.id),
        })
    }

    // ---------------------------------------------------------------------
    // Contracts
    // ---------------------------------------------------------------------

    /// Render ad-hoc contract text. `None` uses the default agreement.
    pub fn render_contract(
        &self,
        template: Option<&str>,
        tags: &HashMap<String, String>,
        conditions: &HashMap<String, bool>,
    ) -> String {
        studiodesk_contracts::render(
            template.unwrap_or(DEFAULT_CONTRACT_TEMPLATE),
            tags,
            conditions,
        )
    }

    /// The client opened the signing page.
    pub async fn view_contract(&self, token: &str) -> ProvisioningResult<Contract> {
        let mut contract = self.contract_by_token(token).await?;
        if contract.mark_viewed(Utc::now()) {
            self.store.update_contract(&contract).await?;
        }
        Ok(contract)
    }

    pub async fn sign_contract(
        &self,
        token: &str,
        signature: ClientSignature,
    ) -> ProvisioningResult<Contract> {
        let mut contract = self.contract_by_token(token).await?;
        contract
            .sign(signature, Utc::now())
            .map_err(ProvisioningError::from)
            .inspect_err(|err| log_rejection("sign_contract", err))?;
        self.store.update_contract(&contract).await?;
        info!(
            tenant_id = %contract.tenant_id,
            contract_id = %contract.id,
            "contract signed"
        );
        Ok(contract)
    }

    async fn contract_by_token(&self, token: &str) -> ProvisioningResult<Contract> {
        self.store
            .get_contract_by_token(token.trim())
            .await?
            .ok_or_else(|| ProvisioningError::NotFound("contract not found".to_string()))
    }

    // ---------------------------------------------------------------------
    // Tenant slot administration
    // ---------------------------------------------------------------------

    pub async fn generate_slots(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
        windows: &[AvailabilityWindow],
    ) -> ProvisioningResult<Vec<BookingSlot>> {
        self.slots().generate(tenant_id, event_id, windows).await
    }

    pub async fn block_slot(
        &self,
        tenant_id: TenantId,
        slot_id: SlotId,
    ) -> ProvisioningResult<BookingSlot> {
        self.slots().block(tenant_id, slot_id).await
    }

    pub async fn cancel_slot(
        &self,
        tenant_id: TenantId,
        slot_id: SlotId,
    ) -> ProvisioningResult<BookingSlot> {
        self.slots().cancel(tenant_id, slot_id).await
    }

    pub async fn delete_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> ProvisioningResult<u64> {
        self.slots().delete_event(tenant_id, event_id).await
    }

    // ---------------------------------------------------------------------
    // Provisioning steps
    // ---------------------------------------------------------------------

    async fn load_event(
        &self,
        slot: &BookingSlot,
        secured: &str,
        records: &mut ProvisionedRecords,
    ) -> Option<BookingEvent> {
        match self.store.get_event(slot.tenant_id, slot.event_id).await {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                record_issue(
                    records,
                    slot.tenant_id,
                    secured,
                    ProvisioningStep::LoadEvent,
                    format!("event {} no longer exists", slot.event_id),
                );
                None
            }
            Err(err) => {
                record_issue(records, slot.tenant_id, secured, ProvisioningStep::LoadEvent, err);
                None
            }
        }
    }

    async fn load_package(
        &self,
        tenant_id: TenantId,
        package_id: PackageId,
        secured: &str,
        records: &mut ProvisionedRecords,
    ) -> Option<Package> {
        match self.store.get_package(tenant_id, package_id).await {
            Ok(package) => package,
            Err(err) => {
                record_issue(records, tenant_id, secured, ProvisioningStep::LoadPackage, err);
                None
            }
        }
    }

    async fn load_profile(
        &self,
        tenant_id: TenantId,
        secured: &str,
        records: &mut ProvisionedRecords,
    ) -> StudioProfile {
        match self.store.get_studio_profile(tenant_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => StudioProfile::new(tenant_id, FALLBACK_STUDIO_NAME),
            Err(err) => {
                record_issue(records, tenant_id, secured, ProvisioningStep::LoadProfile, err);
                StudioProfile::new(tenant_id, FALLBACK_STUDIO_NAME)
            }
        }
    }

    /// The client a quote was issued to. A lead without one still books;
    /// the gap is recorded and its emails are skipped.
    async fn quote_client(
        &self,
        lead: &Lead,
        secured: &str,
        records: &mut ProvisionedRecords,
    ) -> Option<Client> {
        let Some(client_id) = lead.client_id else {
            record_issue(
                records,
                lead.tenant_id,
                secured,
                ProvisioningStep::ResolveClient,
                "lead has no client on record",
            );
            return None;
        };
        match self.store.get_client(lead.tenant_id, client_id).await {
            Ok(Some(client)) => Some(client),
            Ok(None) => {
                record_issue(
                    records,
                    lead.tenant_id,
                    secured,
                    ProvisioningStep::ResolveClient,
                    format!("client {client_id} no longer exists"),
                );
                None
            }
            Err(err) => {
                record_issue(records, lead.tenant_id, secured, ProvisioningStep::ResolveClient, err);
                None
            }
        }
    }

    /// Reuse the client with this email, or create one. A concurrent create
    /// of the same email surfaces as a unique violation and is re-read.
    async fn resolve_client(
        &self,
        tenant_id: TenantId,
        name: &str,
        email: &str,
        phone: Option<String>,
        source: ClientSource,
    ) -> ProvisioningResult<Client> {
        if let Some(client) = self.store.find_client_by_email(tenant_id, email).await? {
            return Ok(client);
        }

        let client = Client::create(
            ClientId::new(),
            NewClient {
                tenant_id,
                full_name: name.to_string(),
                email: email.to_string(),
                phone,
                source,
            },
            Utc::now(),
        )?;
        match self.store.insert_client(client.clone()).await {
            Ok(()) => {
                info!(tenant_id = %tenant_id, client_id = %client.id, "client created");
                Ok(client)
            }
            Err(StoreError::UniqueViolation(_)) => self
                .store
                .find_client_by_email(tenant_id, email)
                .await?
                .ok_or_else(|| {
                    ProvisioningError::Store(StoreError::NotFound(format!(
                        "client {email} vanished after a duplicate insert"
                    )))
                }),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_job(
        &self,
        draft: JobDraft,
        secured: &str,
        records: &mut ProvisionedRecords,
    ) -> Option<Job> {
        let tenant_id = draft.tenant_id;
        match self.insert_job(draft).await {
            Ok(job) => {
                records.job_id = Some(job.id);
                records.job_number = Some(job.job_number);
                Some(job)
            }
            Err(err) => {
                record_issue(records, tenant_id, secured, ProvisioningStep::CreateJob, err);
                None
            }
        }
    }

    /// Allocate a number and insert, allocating again on a number collision.
    async fn insert_job(&self, draft: JobDraft) -> ProvisioningResult<Job> {
        let mut attempt = 1;
        loop {
            let issued = next_job_number(&*self.store, draft.tenant_id).await?;
            let job = Job::create(JobId::new(), issued.number, draft.clone(), Utc::now());
            match self.store.insert_job(job.clone()).await {
                Ok(()) => {
                    info!(
                        tenant_id = %job.tenant_id,
                        job_id = %job.id,
                        job_number = %job.job_number,
                        source = ?issued.source,
                        "job created"
                    );
                    return Ok(job);
                }
                Err(StoreError::UniqueViolation(msg)) if attempt < MAX_JOB_INSERT_ATTEMPTS => {
                    warn!(
                        tenant_id = %draft.tenant_id,
                        job_number = %issued.number,
                        attempt,
                        reason = %msg,
                        "job number collision; allocating again"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn package_policy(&self, package: Option<&Package>) -> Result<DepositPolicy, DomainError> {
        match package {
            Some(p) if p.require_deposit => DepositPolicy::deposit(
                p.deposit_percent
                    .unwrap_or(self.settings.default_deposit_percent),
            ),
            _ => Ok(DepositPolicy::single_invoice()),
        }
    }

    /// Invoices for a freshly provisioned job. Skipped when nothing is owed.
    #[allow(clippy::too_many_arguments)]
    async fn auto_invoices(
        &self,
        profile: &StudioProfile,
        client_id: Option<ClientId>,
        job: &Job,
        package: Option<&Package>,
        package_label: Option<String>,
        secured: &str,
        records: &mut ProvisionedRecords,
    ) -> (Vec<Invoice>, Option<DepositTerms>) {
        let Some(total) = job.package_amount.filter(|a| a.is_positive()) else {
            return (Vec::new(), None);
        };

        let result = match self.package_policy(package) {
            Ok(policy) => self
                .persist_invoices(
                    job,
                    client_id,
                    total,
                    policy,
                    self.settings.tax_rate,
                    package_label,
                    &profile.currency,
                )
                .await
                .map(|invoices| (deposit_terms(&invoices, policy), invoices)),
            Err(err) => Err(err.into()),
        };

        match result {
            Ok((deposit, invoices)) => {
                records.invoice_ids = invoices.iter().map(|i| i.id).collect();
                (invoices, deposit)
            }
            Err(err) => {
                record_issue(
                    records,
                    job.tenant_id,
                    secured,
                    ProvisioningStep::CreateInvoices,
                    err,
                );
                (Vec::new(), None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_invoices(
        &self,
        job: &Job,
        client_id: Option<ClientId>,
        total: Money,
        policy: DepositPolicy,
        tax_rate: Percent,
        package_label: Option<String>,
        currency: &str,
    ) -> ProvisioningResult<Vec<Invoice>> {
        let now = Utc::now();
        let specs = plan_invoices(&InvoicePlanRequest {
            job_number: job.job_number,
            job_label: job.title.clone(),
            package_label,
            package_total: total,
            policy,
            tax_rate,
            today: now.date_naive(),
            event_date: job.date,
        })?;
        let invoices: Vec<Invoice> = specs
            .into_iter()
            .map(|spec| {
                Invoice::from_spec(
                    InvoiceId::new(),
                    job.tenant_id,
                    Some(job.id),
                    client_id,
                    spec,
                    currency,
                    now,
                )
            })
            .collect();
        self.store.insert_invoices(invoices.clone()).await?;
        Ok(invoices)
    }

    async fn create_contract(
        &self,
        profile: &StudioProfile,
        client: Option<&Client>,
        job: &Job,
        deposit: Option<DepositTerms>,
        secured: &str,
        records: &mut ProvisionedRecords,
    ) -> Option<Contract> {
        let now = Utc::now();
        let terms = ContractTerms {
            client_name: client
                .map(|c| c.full_name())
                .unwrap_or_else(|| UNNAMED_CLIENT.to_string()),
            client_email: client.and_then(|c| c.email.clone()).unwrap_or_default(),
            job_date: job.date,
            job_time: job.time,
            job_location: job.location.clone(),
            package_name: job.package_name.clone(),
            package_amount: job.package_amount.unwrap_or(Money::ZERO),
            included_images: job.included_images,
            business_name: profile.display_name().to_string(),
            photographer_name: profile.photographer_name.clone(),
            today: now.date_naive(),
            deposit,
        };
        let template = profile
            .contract_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_CONTRACT_TEMPLATE);
        let contract = Contract::issue(
            ContractId::new(),
            IssueContract {
                tenant_id: job.tenant_id,
                job_id: Some(job.id),
                client_id: client.map(|c| c.id),
                content: terms.render(template),
                validity_days: self.settings.contract_validity_days,
                photographer_signature: profile.signature_image.clone(),
            },
            now,
        );

        match self.store.insert_contract(contract.clone()).await {
            Ok(()) => {
                records.contract_id = Some(contract.id);
                Some(contract)
            }
            Err(err) => {
                record_issue(
                    records,
                    job.tenant_id,
                    secured,
                    ProvisioningStep::CreateContract,
                    err,
                );
                None
            }
        }
    }

    /// Confirmation now; invoice and signing emails as one delayed batch.
    /// Nothing is sent without a client to address.
    async fn notify(
        &self,
        profile: &StudioProfile,
        client: Option<&Client>,
        session: &SessionSummary,
        invoices: &[Invoice],
        contract: Option<&Contract>,
        records: &mut ProvisionedRecords,
    ) {
        let Some(client) = client else {
            return;
        };
        records.notifications = self.plan_notifications(profile, client, session, invoices, contract);
        if records.notifications.is_empty() {
            return;
        }
        records.dispatch = flush(&records.notifications, &*self.notifier, &*self.followups).await;
    }

    fn plan_notifications(
        &self,
        profile: &StudioProfile,
        client: &Client,
        session: &SessionSummary,
        invoices: &[Invoice],
        contract: Option<&Contract>,
    ) -> NotificationPlan {
        let mut plan = NotificationPlan::new();
        let Some(to) = client.email.clone().filter(|e| !e.is_empty()) else {
            return plan;
        };

        let mut base = profile.brand_data();
        base.insert("clientName".into(), Value::String(client.first_name.clone()));
        base.insert("jobTitle".into(), Value::String(session.title.clone()));

        let mut confirmation = base.clone();
        confirmation.insert(
            "jobDate".into(),
            Value::String(
                session
                    .date
                    .map(|d| d.format("%A, %-d %B %Y").to_string())
                    .unwrap_or_else(|| TO_BE_CONFIRMED.to_string()),
            ),
        );
        confirmation.insert(
            "location".into(),
            Value::String(session.location.clone().unwrap_or_default()),
        );
        plan.now(request(NotificationTemplate::BookingConfirmation, &to, confirmation));

        let delay = self.settings.followup_delay();
        if let Some(invoice) = first_payable(invoices) {
            let mut data = base.clone();
            data.insert(
                "invoiceNumber".into(),
                Value::String(invoice.invoice_number.clone()),
            );
            data.insert(
                "amount".into(),
                Value::String(invoice.total.format_currency()),
            );
            data.insert(
                "dueDate".into(),
                Value::String(format_long_date(invoice.due_date)),
            );
            plan.after(delay, request(NotificationTemplate::Invoice, &to, data));
        }

        if let Some(contract) = contract {
            let mut data = base;
            data.insert(
                "signingUrl".into(),
                Value::String(self.settings.signing_url(&contract.signing_token)),
            );
            plan.after(delay, request(NotificationTemplate::ContractSigning, &to, data));
        }

        plan
    }
}

fn request(template: NotificationTemplate, to: &str, data: Map<String, Value>) -> NotificationRequest {
    NotificationRequest {
        template,
        to: to.to_string(),
        data,
    }
}

/// The invoice the client is asked to pay first: the deposit, else the only invoice.
fn first_payable(invoices: &[Invoice]) -> Option<&Invoice> {
    invoices
        .iter()
        .find(|i| i.invoice_type == InvoiceType::Deposit)
        .or_else(|| invoices.first())
}

fn deposit_terms(invoices: &[Invoice], policy: DepositPolicy) -> Option<DepositTerms> {
    invoices
        .iter()
        .find(|i| i.invoice_type == InvoiceType::Deposit)
        .map(|i| DepositTerms {
            amount: i.amount,
            percent: policy.deposit_percent,
        })
}

fn quote_rejection(err: DomainError) -> ProvisioningError {
    match err {
        DomainError::Conflict(msg) => ProvisioningError::AlreadyBooked(msg),
        other => other.into(),
    }
}

fn log_rejection(operation: &str, err: &ProvisioningError) {
    if err.is_expected() {
        info!(operation, error = %err, "request rejected");
    } else {
        error!(operation, error = %err, "request failed");
    }
}

fn client_resolution_failed(
    tenant_id: TenantId,
    secured: &str,
    err: ProvisioningError,
) -> ProvisioningError {
    error!(
        tenant_id = %tenant_id,
        secured,
        step = "resolve_client",
        error = %err,
        "resource secured but client resolution failed"
    );
    ProvisioningError::ClientResolution {
        secured: secured.to_string(),
        reason: err.to_string(),
    }
}

fn record_issue(
    records: &mut ProvisionedRecords,
    tenant_id: TenantId,
    secured: &str,
    step: ProvisioningStep,
    err: impl Display,
) {
    let message = err.to_string();
    error!(
        tenant_id = %tenant_id,
        secured,
        step = step.as_str(),
        error = %message,
        "provisioning step failed"
    );
    records.issue(step, message);
}

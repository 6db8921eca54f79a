use serde::Serialize;

use studiodesk_core::{
    ClientId, ContractId, InvoiceId, JobId, JobNumber, LeadId, SlotId, TenantId,
};
use studiodesk_crm::Job;

use crate::notify::{FlushReport, NotificationPlan};

/// A best-effort step that failed after the slot or lead was secured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningIssue {
    pub step: ProvisioningStep,
    pub message: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStep {
    LoadEvent,
    LoadPackage,
    LoadProfile,
    ResolveClient,
    CreateJob,
    CreateInvoices,
    LinkSlot,
    CreateContract,
}

impl ProvisioningStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningStep::LoadEvent => "load_event",
            ProvisioningStep::LoadPackage => "load_package",
            ProvisioningStep::LoadProfile => "load_profile",
            ProvisioningStep::ResolveClient => "resolve_client",
            ProvisioningStep::CreateJob => "create_job",
            ProvisioningStep::CreateInvoices => "create_invoices",
            ProvisioningStep::LinkSlot => "link_slot",
            ProvisioningStep::CreateContract => "create_contract",
        }
    }
}

/// Records created downstream of a secured slot or lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProvisionedRecords {
    pub client_id: Option<ClientId>,
    pub job_id: Option<JobId>,
    pub job_number: Option<JobNumber>,
    pub invoice_ids: Vec<InvoiceId>,
    pub contract_id: Option<ContractId>,
    pub notifications: NotificationPlan,
    pub dispatch: FlushReport,
    pub issues: Vec<ProvisioningIssue>,
}

impl ProvisionedRecords {
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    pub(crate) fn issue(&mut self, step: ProvisioningStep, message: impl Into<String>) {
        self.issues.push(ProvisioningIssue {
            step,
            message: message.into(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReservationOutcome {
    pub slot_id: SlotId,
    pub tenant_id: TenantId,
    #[serde(flatten)]
    pub records: ProvisionedRecords,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteAcceptance {
    pub lead_id: LeadId,
    pub tenant_id: TenantId,
    #[serde(flatten)]
    pub records: ProvisionedRecords,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChangeOutcome {
    pub job: Job,
    pub slot_released: bool,
    pub slot_reclaimed: bool,
    /// The slot could not be re-claimed and the job no longer references it.
    pub slot_detached: Option<SlotId>,
}

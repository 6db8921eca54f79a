use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use studiodesk_core::{
    ClientId, DomainError, Entity, JobId, JobNumber, LeadId, Money, PackageId, SlotId, TenantId,
    TenantScoped,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Upcoming,
    InProgress,
    Editing,
    Delivered,
    Completed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Upcoming => "upcoming",
            JobStatus::InProgress => "in_progress",
            JobStatus::Editing => "editing",
            JobStatus::Delivered => "delivered",
            JobStatus::Completed => "completed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl core::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(JobStatus::Upcoming),
            "in_progress" => Ok(JobStatus::InProgress),
            "editing" => Ok(JobStatus::Editing),
            "delivered" => Ok(JobStatus::Delivered),
            "completed" => Ok(JobStatus::Completed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(DomainError::validation(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

/// Slot side effect required by a job status change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "slot_id", rename_all = "snake_case")]
pub enum SlotEffect {
    None,
    /// The job was canceled; free its slot.
    Release(SlotId),
    /// The job left `canceled`; claim its slot again if still free.
    Reclaim(SlotId),
}

/// Everything about a job except the number the sequencer assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDraft {
    pub tenant_id: TenantId,
    pub client_id: Option<ClientId>,
    pub lead_id: Option<LeadId>,
    pub booking_slot_id: Option<SlotId>,
    pub title: String,
    pub job_type: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub package_id: Option<PackageId>,
    pub package_name: Option<String>,
    pub package_amount: Option<Money>,
    pub included_images: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub job_number: JobNumber,
    pub client_id: Option<ClientId>,
    pub lead_id: Option<LeadId>,
    pub booking_slot_id: Option<SlotId>,
    pub title: String,
    pub job_type: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub package_id: Option<PackageId>,
    pub package_name: Option<String>,
    pub package_amount: Option<Money>,
    pub included_images: Option<u32>,
    pub status: JobStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Job {
    type Id = JobId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Job {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Job {
    /// A new `upcoming` job.
    pub fn create(id: JobId, job_number: JobNumber, draft: JobDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            tenant_id: draft.tenant_id,
            job_number,
            client_id: draft.client_id,
            lead_id: draft.lead_id,
            booking_slot_id: draft.booking_slot_id,
            title: draft.title,
            job_type: draft.job_type,
            date: draft.date,
            time: draft.time,
            end_time: draft.end_time,
            location: draft.location,
            package_id: draft.package_id,
            package_name: draft.package_name,
            package_amount: draft.package_amount,
            included_images: draft.included_images,
            status: JobStatus::Upcoming,
            notes: draft.notes,
            created_at: now,
        }
    }

    /// Move to `next` and report what must happen to the linked slot.
    pub fn change_status(&mut self, next: JobStatus) -> SlotEffect {
        let previous = self.status;
        self.status = next;

        let Some(slot_id) = self.booking_slot_id else {
            return SlotEffect::None;
        };
        match (previous, next) {
            (p, JobStatus::Canceled) if p != JobStatus::Canceled => SlotEffect::Release(slot_id),
            (JobStatus::Canceled, n) if n != JobStatus::Canceled => SlotEffect::Reclaim(slot_id),
            _ => SlotEffect::None,
        }
    }

    /// Drop the slot link after a failed reclaim.
    pub fn detach_slot(&mut self) -> Option<SlotId> {
        self.booking_slot_id.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(slot: Option<SlotId>) -> Job {
        Job::create(
            JobId::new(),
            JobNumber::FIRST,
            JobDraft {
                tenant_id: TenantId::new(),
                client_id: None,
                lead_id: None,
                booking_slot_id: slot,
                title: "Autumn Minis".to_string(),
                job_type: Some("Mini Session".to_string()),
                date: None,
                time: None,
                end_time: None,
                location: None,
                package_id: None,
                package_name: None,
                package_amount: Some(Money::from_major(150)),
                included_images: None,
                notes: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn cancel_releases_and_restore_reclaims() {
        let slot = SlotId::new();
        let mut j = job(Some(slot));
        assert_eq!(j.status, JobStatus::Upcoming);

        assert_eq!(j.change_status(JobStatus::Editing), SlotEffect::None);
        assert_eq!(j.change_status(JobStatus::Canceled), SlotEffect::Release(slot));
        assert_eq!(j.change_status(JobStatus::Canceled), SlotEffect::None);
        assert_eq!(j.change_status(JobStatus::Upcoming), SlotEffect::Reclaim(slot));
    }

    #[test]
    fn jobs_without_slots_have_no_effects() {
        let mut j = job(None);
        assert_eq!(j.change_status(JobStatus::Canceled), SlotEffect::None);
        assert_eq!(j.change_status(JobStatus::Upcoming), SlotEffect::None);
    }

    #[test]
    fn detach_clears_the_link() {
        let slot = SlotId::new();
        let mut j = job(Some(slot));
        assert_eq!(j.detach_slot(), Some(slot));
        assert_eq!(j.booking_slot_id, None);
    }

    #[test]
    fn status_parsing() {
        assert_eq!("in_progress".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert!("ready_for_review".parse::<JobStatus>().is_err());
    }
}

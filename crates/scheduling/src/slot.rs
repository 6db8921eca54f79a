//! Slot state machine.
//!
//! ```text
//! available -> booked      (conditional claim)
//! available -> blocked     (tenant)
//! booked    -> available   (job canceled)
//! available|blocked -> canceled
//! ```
//!
//! `booked_*` fields are written only by [`BookingSlot::apply_claim`], which
//! stores call exclusively from inside their conditional write.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use studiodesk_core::{
    BookingEventId, ClientId, DomainError, DomainResult, Entity, JobId, SlotId, TenantId,
    TenantScoped,
};

use crate::expand::SlotWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Blocked,
    Canceled,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Blocked => "blocked",
            SlotStatus::Canceled => "canceled",
        }
    }

    pub fn can_transition_to(&self, next: SlotStatus) -> bool {
        use SlotStatus::*;
        matches!(
            (*self, next),
            (Available, Booked)
                | (Available, Blocked)
                | (Booked, Available)
                | (Available, Canceled)
                | (Blocked, Canceled)
        )
    }

    /// Error describing why a claim against this status cannot succeed.
    pub fn claim_rejection(&self) -> DomainError {
        match self {
            SlotStatus::Canceled => DomainError::expired("this time slot has been canceled"),
            SlotStatus::Available => DomainError::conflict("this time slot was just taken"),
            _ => DomainError::conflict("this time slot is no longer available"),
        }
    }
}

impl core::str::FromStr for SlotStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SlotStatus::Available),
            "booked" => Ok(SlotStatus::Booked),
            "blocked" => Ok(SlotStatus::Blocked),
            "canceled" => Ok(SlotStatus::Canceled),
            other => Err(DomainError::validation(format!(
                "unknown slot status: {other}"
            ))),
        }
    }
}

/// Booker details written by the available -> booked transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotClaim {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub booked_at: DateTime<Utc>,
    /// Set when re-claiming for an existing job; empty on a fresh booking.
    pub client_id: Option<ClientId>,
    pub job_id: Option<JobId>,
}

impl SlotClaim {
    pub fn new(
        name: &str,
        email: &str,
        phone: Option<&str>,
        booked_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("a valid email is required"));
        }
        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            booked_at,
            client_id: None,
            job_id: None,
        })
    }

    pub fn for_job(mut self, client_id: Option<ClientId>, job_id: JobId) -> Self {
        self.client_id = client_id;
        self.job_id = Some(job_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSlot {
    pub id: SlotId,
    pub tenant_id: TenantId,
    pub event_id: BookingEventId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub client_id: Option<ClientId>,
    pub job_id: Option<JobId>,
    pub booked_name: Option<String>,
    pub booked_email: Option<String>,
    pub booked_phone: Option<String>,
    pub booked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Entity for BookingSlot {
    type Id = SlotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for BookingSlot {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl BookingSlot {
    pub fn available(
        id: SlotId,
        tenant_id: TenantId,
        event_id: BookingEventId,
        window: SlotWindow,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            event_id,
            date: window.date,
            start_time: window.start,
            end_time: window.end,
            status: SlotStatus::Available,
            client_id: None,
            job_id: None,
            booked_name: None,
            booked_email: None,
            booked_phone: None,
            booked_at: None,
            created_at,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }

    /// Apply the available -> booked transition.
    ///
    /// Only valid inside a store's conditional write whose predicate is
    /// `status = available`; the status check here mirrors that predicate.
    pub fn apply_claim(&mut self, claim: &SlotClaim) -> DomainResult<()> {
        if !self.is_available() {
            return Err(self.status.claim_rejection());
        }
        self.status = SlotStatus::Booked;
        self.booked_name = Some(claim.name.clone());
        self.booked_email = Some(claim.email.clone());
        self.booked_phone = claim.phone.clone();
        self.booked_at = Some(claim.booked_at);
        self.client_id = claim.client_id;
        self.job_id = claim.job_id;
        Ok(())
    }

    /// Back-fill entity references on a booked slot.
    pub fn link(&mut self, client_id: Option<ClientId>, job_id: Option<JobId>) -> DomainResult<()> {
        if self.status != SlotStatus::Booked {
            return Err(DomainError::conflict("only booked slots can be linked"));
        }
        if client_id.is_some() {
            self.client_id = client_id;
        }
        if job_id.is_some() {
            self.job_id = job_id;
        }
        Ok(())
    }

    /// booked -> available, clearing every booking field. Releasing a slot
    /// that is not booked is a no-op.
    pub fn release(&mut self) -> bool {
        if self.status != SlotStatus::Booked {
            return false;
        }
        self.status = SlotStatus::Available;
        self.client_id = None;
        self.job_id = None;
        self.booked_name = None;
        self.booked_email = None;
        self.booked_phone = None;
        self.booked_at = None;
        true
    }

    pub fn block(&mut self) -> DomainResult<()> {
        self.transition(SlotStatus::Blocked)
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.transition(SlotStatus::Canceled)
    }

    fn transition(&mut self, next: SlotStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::conflict(format!(
                "slot cannot move from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> BookingSlot {
        BookingSlot::available(
            SlotId::new(),
            TenantId::new(),
            BookingEventId::new(),
            SlotWindow {
                date: NaiveDate::from_ymd_opt(2026, 4, 4).unwrap(),
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 20, 0).unwrap(),
            },
            Utc::now(),
        )
    }

    fn claim() -> SlotClaim {
        SlotClaim::new("Sarah Jones", "sarah@example.com", Some(" "), Utc::now()).unwrap()
    }

    #[test]
    fn claim_sets_booking_fields_once() {
        let mut s = slot();
        s.apply_claim(&claim()).unwrap();
        assert_eq!(s.status, SlotStatus::Booked);
        assert_eq!(s.booked_email.as_deref(), Some("sarah@example.com"));
        assert_eq!(s.booked_phone, None);

        assert!(matches!(s.apply_claim(&claim()), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn canceled_slot_claim_is_expired() {
        let mut s = slot();
        s.cancel().unwrap();
        assert!(matches!(s.apply_claim(&claim()), Err(DomainError::Expired(_))));
    }

    #[test]
    fn release_clears_everything() {
        let mut s = slot();
        s.apply_claim(&claim()).unwrap();
        s.link(Some(ClientId::new()), Some(JobId::new())).unwrap();
        assert!(s.job_id.is_some());

        assert!(s.release());
        assert_eq!(s.status, SlotStatus::Available);
        assert!(s.client_id.is_none() && s.job_id.is_none());
        assert!(s.booked_name.is_none() && s.booked_at.is_none());
        assert!(!s.release());
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        let mut s = slot();
        s.block().unwrap();
        assert!(s.block().is_err());
        assert!(s.apply_claim(&claim()).is_err());
        s.cancel().unwrap();
        assert!(s.cancel().is_err());

        let mut booked = slot();
        booked.apply_claim(&claim()).unwrap();
        assert!(booked.cancel().is_err());
        assert!(booked.block().is_err());
    }

    #[test]
    fn claim_requires_name_and_email() {
        assert!(SlotClaim::new(" ", "a@b.c", None, Utc::now()).is_err());
        assert!(SlotClaim::new("A", "nope", None, Utc::now()).is_err());
    }
}

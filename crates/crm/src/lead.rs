use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use studiodesk_core::{
    ClientId, DomainError, DomainResult, Entity, LeadId, Money, PackageId, TenantId, TenantScoped,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Quoted,
    Booked,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Quoted => "quoted",
            LeadStatus::Booked => "booked",
            LeadStatus::Lost => "lost",
        }
    }

    /// Whether a quote in this status may still be accepted.
    pub fn accepts_quote(&self) -> bool {
        !matches!(self, LeadStatus::Booked | LeadStatus::Lost)
    }
}

impl core::str::FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "contacted" => Ok(LeadStatus::Contacted),
            "quoted" => Ok(LeadStatus::Quoted),
            "booked" => Ok(LeadStatus::Booked),
            "lost" => Ok(LeadStatus::Lost),
            other => Err(DomainError::validation(format!(
                "unknown lead status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub tenant_id: TenantId,
    pub client_id: Option<ClientId>,
    pub job_type: Option<String>,
    pub preferred_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub quoted_package_id: Option<PackageId>,
    pub quoted_amount: Option<Money>,
    pub quote_token: Option<String>,
    pub quote_accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Lead {
    type Id = LeadId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Lead {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Lead {
    /// `Conflict` when already booked, `Expired` when lost.
    pub fn check_quote_acceptable(&self) -> DomainResult<()> {
        match self.status {
            LeadStatus::Booked => Err(DomainError::conflict(
                "this quote has already been accepted",
            )),
            LeadStatus::Lost => Err(DomainError::expired("this quote is no longer available")),
            _ => Ok(()),
        }
    }

    /// Apply the acceptance transition. Stores call this only inside the
    /// conditional write guarding `status not in (booked, lost)`.
    pub fn accept_quote(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.check_quote_acceptable()?;
        self.status = LeadStatus::Booked;
        self.quote_accepted_at = Some(at);
        Ok(())
    }

    /// Amount to bill: the quoted amount when positive, else the package price.
    pub fn quote_amount(&self, package_price: Option<Money>) -> Money {
        self.quoted_amount
            .filter(|a| a.is_positive())
            .or(package_price)
            .unwrap_or(Money::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(status: LeadStatus) -> Lead {
        Lead {
            id: LeadId::new(),
            tenant_id: TenantId::new(),
            client_id: Some(ClientId::new()),
            job_type: Some("Wedding".to_string()),
            preferred_date: NaiveDate::from_ymd_opt(2026, 11, 7),
            location: None,
            source: Some("instagram".to_string()),
            status,
            notes: None,
            quoted_package_id: None,
            quoted_amount: Some(Money::from_major(3200)),
            quote_token: Some("tok".to_string()),
            quote_accepted_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn booked_and_lost_leads_reject_acceptance() {
        assert!(matches!(
            lead(LeadStatus::Booked).check_quote_acceptable(),
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            lead(LeadStatus::Lost).check_quote_acceptable(),
            Err(DomainError::Expired(_))
        ));
        assert!(lead(LeadStatus::New).check_quote_acceptable().is_ok());
    }

    #[test]
    fn accepting_is_terminal() {
        let mut l = lead(LeadStatus::Quoted);
        l.accept_quote(Utc::now()).unwrap();
        assert_eq!(l.status, LeadStatus::Booked);
        assert!(l.quote_accepted_at.is_some());
        assert!(l.accept_quote(Utc::now()).is_err());
    }

    #[test]
    fn quoted_amount_beats_package_price() {
        let mut l = lead(LeadStatus::Quoted);
        assert_eq!(
            l.quote_amount(Some(Money::from_major(100))),
            Money::from_major(3200)
        );
        l.quoted_amount = Some(Money::ZERO);
        assert_eq!(
            l.quote_amount(Some(Money::from_major(100))),
            Money::from_major(100)
        );
        l.quoted_amount = None;
        assert_eq!(l.quote_amount(None), Money::ZERO);
    }
}

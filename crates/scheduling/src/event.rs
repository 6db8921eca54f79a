use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studiodesk_core::{
    BookingEventId, DomainError, DomainResult, Entity, Money, PackageId, TenantId, TenantScoped,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingEventStatus {
    Draft,
    Published,
    Closed,
    Archived,
}

impl BookingEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEventStatus::Draft => "draft",
            BookingEventStatus::Published => "published",
            BookingEventStatus::Closed => "closed",
            BookingEventStatus::Archived => "archived",
        }
    }
}

impl core::str::FromStr for BookingEventStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BookingEventStatus::Draft),
            "published" => Ok(BookingEventStatus::Published),
            "closed" => Ok(BookingEventStatus::Closed),
            "archived" => Ok(BookingEventStatus::Archived),
            other => Err(DomainError::validation(format!(
                "unknown booking event status: {other}"
            ))),
        }
    }
}

/// A bookable offering (e.g. a mini-session day) that owns a set of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEvent {
    pub id: BookingEventId,
    pub tenant_id: TenantId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub package_id: Option<PackageId>,
    pub custom_price: Option<Money>,
    pub slot_duration_minutes: u32,
    pub buffer_minutes: u32,
    pub status: BookingEventStatus,
    pub auto_create_job: bool,
    pub auto_create_invoice: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for BookingEvent {
    type Id = BookingEventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for BookingEvent {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl BookingEvent {
    /// Price charged for a slot of this event: the custom price when set,
    /// otherwise the linked package's price.
    pub fn price(&self, package_price: Option<Money>) -> Option<Money> {
        self.custom_price.or(package_price)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("event title is required"));
        }
        if self.slot_duration_minutes == 0 {
            return Err(DomainError::validation(
                "slot duration must be at least one minute",
            ));
        }
        if self.custom_price.is_some_and(|p| p.is_negative()) {
            return Err(DomainError::validation("custom price cannot be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> BookingEvent {
        BookingEvent {
            id: BookingEventId::new(),
            tenant_id: TenantId::new(),
            title: "Autumn Minis".to_string(),
            description: None,
            location: Some("Botanic Gardens".to_string()),
            package_id: None,
            custom_price: None,
            slot_duration_minutes: 20,
            buffer_minutes: 5,
            status: BookingEventStatus::Published,
            auto_create_job: true,
            auto_create_invoice: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn custom_price_wins_over_package_price() {
        let mut e = event();
        assert_eq!(e.price(Some(Money::from_major(300))), Some(Money::from_major(300)));
        e.custom_price = Some(Money::from_major(150));
        assert_eq!(e.price(Some(Money::from_major(300))), Some(Money::from_major(150)));
        assert_eq!(event().price(None), None);
    }

    #[test]
    fn zero_duration_is_invalid() {
        let mut e = event();
        assert!(e.validate().is_ok());
        e.slot_duration_minutes = 0;
        assert!(e.validate().is_err());
    }
}

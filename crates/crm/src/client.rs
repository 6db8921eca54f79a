use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studiodesk_core::{ClientId, DomainError, DomainResult, Entity, TenantId, TenantScoped};

/// Where a client record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientSource {
    Booking,
    Quote,
    Manual,
}

impl ClientSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientSource::Booking => "booking",
            ClientSource::Quote => "quote",
            ClientSource::Manual => "manual",
        }
    }
}

impl core::str::FromStr for ClientSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" => Ok(ClientSource::Booking),
            "quote" => Ok(ClientSource::Quote),
            "manual" => Ok(ClientSource::Manual),
            other => Err(DomainError::validation(format!(
                "unknown client source: {other}"
            ))),
        }
    }
}

/// Normalise an email for the `(tenant_id, email)` dedupe key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Split a full name on the first run of whitespace.
///
/// `"Mary Jane Watson"` -> `("Mary", Some("Jane Watson"))`.
pub fn split_name(full_name: &str) -> (String, Option<String>) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest: Vec<&str> = parts.collect();
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    (first, last)
}

/// A tenant-scoped contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Normalised; see [`normalize_email`].
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<ClientSource>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Client {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Details for a client created as a side effect of a booking or quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub tenant_id: TenantId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub source: ClientSource,
}

impl Client {
    pub fn create(id: ClientId, new: NewClient, now: DateTime<Utc>) -> DomainResult<Self> {
        let (first_name, last_name) = split_name(&new.full_name);
        if first_name.is_empty() {
            return Err(DomainError::validation("client name is required"));
        }
        let email = normalize_email(&new.email);
        if email.is_empty() {
            return Err(DomainError::validation("client email is required"));
        }

        Ok(Self {
            id,
            tenant_id: new.tenant_id,
            first_name,
            last_name,
            email: Some(email),
            phone: new.phone.filter(|p| !p.trim().is_empty()),
            notes: None,
            tags: vec![new.source.as_str().to_string()],
            source: Some(new.source),
            created_at: now,
        })
    }

    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_splits_on_first_whitespace() {
        assert_eq!(
            split_name("  Mary   Jane Watson "),
            ("Mary".to_string(), Some("Jane Watson".to_string()))
        );
        assert_eq!(split_name("Cher"), ("Cher".to_string(), None));
        assert_eq!(split_name("   "), (String::new(), None));
    }

    #[test]
    fn booking_clients_are_tagged_and_normalised() {
        let client = Client::create(
            ClientId::new(),
            NewClient {
                tenant_id: TenantId::new(),
                full_name: "Sarah Jones".to_string(),
                email: " Sarah@Example.COM ".to_string(),
                phone: Some(String::new()),
                source: ClientSource::Booking,
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(client.email.as_deref(), Some("sarah@example.com"));
        assert_eq!(client.tags, vec!["booking".to_string()]);
        assert_eq!(client.phone, None);
        assert_eq!(client.full_name(), "Sarah Jones");
    }

    #[test]
    fn blank_names_are_rejected() {
        let err = Client::create(
            ClientId::new(),
            NewClient {
                tenant_id: TenantId::new(),
                full_name: " ".to_string(),
                email: "a@b.c".to_string(),
                phone: None,
                source: ClientSource::Quote,
            },
            Utc::now(),
        );
        assert!(err.is_err());
    }
}

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use studiodesk_core::{
    ClientId, ContractId, DomainError, DomainResult, Entity, JobId, TenantId, TenantScoped,
};

/// Length of the public signing token.
pub const SIGNING_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Sent,
    Viewed,
    Signed,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Sent => "sent",
            ContractStatus::Viewed => "viewed",
            ContractStatus::Signed => "signed",
        }
    }
}

impl core::str::FromStr for ContractStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContractStatus::Draft),
            "sent" => Ok(ContractStatus::Sent),
            "viewed" => Ok(ContractStatus::Viewed),
            "signed" => Ok(ContractStatus::Signed),
            other => Err(DomainError::validation(format!(
                "unknown contract status: {other}"
            ))),
        }
    }
}

/// Captured signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photographer_signature: Option<String>,
}

/// What the client submits when signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSignature {
    pub signature_image: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An issued contract. `content` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub tenant_id: TenantId,
    pub job_id: Option<JobId>,
    pub client_id: Option<ClientId>,
    pub content: String,
    pub status: ContractStatus,
    pub signing_token: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signature_data: Option<SignatureData>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Contract {
    type Id = ContractId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Contract {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Fresh unguessable signing token.
pub fn generate_signing_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SIGNING_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Inputs for issuing a contract.
#[derive(Debug, Clone)]
pub struct IssueContract {
    pub tenant_id: TenantId,
    pub job_id: Option<JobId>,
    pub client_id: Option<ClientId>,
    pub content: String,
    pub validity_days: u32,
    pub photographer_signature: Option<String>,
}

impl Contract {
    /// Issue a contract in `sent` status, ready for the client to sign.
    pub fn issue(id: ContractId, cmd: IssueContract, now: DateTime<Utc>) -> Self {
        let signature_data = cmd.photographer_signature.map(|sig| SignatureData {
            photographer_signature: Some(sig),
            ..SignatureData::default()
        });
        Self {
            id,
            tenant_id: cmd.tenant_id,
            job_id: cmd.job_id,
            client_id: cmd.client_id,
            content: cmd.content,
            status: ContractStatus::Sent,
            signing_token: generate_signing_token(),
            sent_at: Some(now),
            viewed_at: None,
            expires_at: Some(now + Duration::days(i64::from(cmd.validity_days))),
            signed_at: None,
            signature_data,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Client opened the signing page. Only `sent` moves forward; returns
    /// whether anything changed.
    pub fn mark_viewed(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ContractStatus::Sent {
            return false;
        }
        self.status = ContractStatus::Viewed;
        self.viewed_at = Some(now);
        true
    }

    pub fn sign(&mut self, signature: ClientSignature, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            ContractStatus::Signed => {
                return Err(DomainError::conflict("contract is already signed"));
            }
            ContractStatus::Draft => {
                return Err(DomainError::conflict("contract has not been sent"));
            }
            ContractStatus::Sent | ContractStatus::Viewed => {}
        }
        if self.is_expired(now) {
            return Err(DomainError::expired("signing link has expired"));
        }
        if signature.signature_image.trim().is_empty() {
            return Err(DomainError::validation("signature is required"));
        }

        let mut data = self.signature_data.take().unwrap_or_default();
        data.signature_image = Some(signature.signature_image);
        data.ip_address = signature.ip_address;
        data.user_agent = signature.user_agent;

        self.signature_data = Some(data);
        self.status = ContractStatus::Signed;
        self.signed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()
    }

    fn issued(photographer_signature: Option<&str>) -> Contract {
        Contract::issue(
            ContractId::new(),
            IssueContract {
                tenant_id: TenantId::new(),
                job_id: Some(JobId::new()),
                client_id: Some(ClientId::new()),
                content: "AGREEMENT".to_string(),
                validity_days: 30,
                photographer_signature: photographer_signature.map(str::to_string),
            },
            now(),
        )
    }

    fn signature() -> ClientSignature {
        ClientSignature {
            signature_image: "data:image/png;base64,AAAA".to_string(),
            ip_address: Some("203.0.113.9".to_string()),
            user_agent: None,
        }
    }

    #[test]
    fn issued_contracts_are_sent_with_a_random_token() {
        let a = issued(None);
        let b = issued(None);
        assert_eq!(a.status, ContractStatus::Sent);
        assert_eq!(a.signing_token.len(), SIGNING_TOKEN_LEN);
        assert!(a.signing_token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.signing_token, b.signing_token);
        assert_eq!(a.expires_at, Some(now() + Duration::days(30)));
        assert!(a.signature_data.is_none());
    }

    #[test]
    fn signing_keeps_photographer_signature() {
        let mut contract = issued(Some("photographer-sig"));
        assert!(contract.mark_viewed(now()));
        assert!(!contract.mark_viewed(now()));

        contract.sign(signature(), now()).unwrap();
        assert_eq!(contract.status, ContractStatus::Signed);
        let data = contract.signature_data.unwrap();
        assert_eq!(data.photographer_signature.as_deref(), Some("photographer-sig"));
        assert_eq!(data.ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn signing_twice_conflicts() {
        let mut contract = issued(None);
        contract.sign(signature(), now()).unwrap();
        assert!(matches!(
            contract.sign(signature(), now()),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn expired_contracts_cannot_be_signed() {
        let mut contract = issued(None);
        let later = now() + Duration::days(31);
        assert!(matches!(
            contract.sign(signature(), later),
            Err(DomainError::Expired(_))
        ));
        assert_eq!(contract.status, ContractStatus::Sent);
    }

    #[test]
    fn blank_signature_is_rejected() {
        let mut contract = issued(None);
        let mut sig = signature();
        sig.signature_image = "  ".to_string();
        assert!(matches!(
            contract.sign(sig, now()),
            Err(DomainError::Validation(_))
        ));
    }
}

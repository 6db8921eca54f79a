use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studiodesk_contracts::{Contract, ContractStatus};
use studiodesk_core::{ContractId, DomainError, InvoiceId, Percent};
use studiodesk_infra::provisioning::InvoiceOptions;
use studiodesk_scheduling::{AvailabilityWindow, BookingSlot};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BookSlotRequest {
    pub slot_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptQuoteRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SignContractRequest {
    pub signature_image: String,
}

/// Percentages are decimals (`25` or `12.5`).
#[derive(Debug, Default, Deserialize)]
pub struct GenerateInvoicesRequest {
    pub requires_deposit: Option<bool>,
    pub deposit_percent: Option<f64>,
    pub tax_rate: Option<f64>,
}

impl GenerateInvoicesRequest {
    pub fn into_options(self) -> Result<InvoiceOptions, DomainError> {
        let deposit_percent = self
            .deposit_percent
            .map(Percent::from_decimal)
            .transpose()?
            .map(|p| p.ensure_at_most_hundred("deposit_percent"))
            .transpose()?;
        Ok(InvoiceOptions {
            requires_deposit: self.requires_deposit,
            deposit_percent,
            tax_rate: self.tax_rate.map(Percent::from_decimal).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeJobStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RenderContractRequest {
    pub template: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub conditions: HashMap<String, bool>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateSlotsRequest {
    pub windows: Vec<AvailabilityWindow>,
}

// -------------------------
// Response DTOs
// -------------------------

/// What the public signing page shows. Never includes tenant or client ids.
#[derive(Debug, Serialize)]
pub struct ContractView {
    pub id: ContractId,
    pub status: ContractStatus,
    pub content: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
}

impl From<Contract> for ContractView {
    fn from(c: Contract) -> Self {
        Self {
            id: c.id,
            status: c.status,
            content: c.content,
            expires_at: c.expires_at,
            signed_at: c.signed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoicesCreated {
    pub invoice_ids: Vec<InvoiceId>,
}

#[derive(Debug, Serialize)]
pub struct SlotsCreated {
    pub slots: Vec<BookingSlot>,
}

// -------------------------
// Helpers
// -------------------------

/// Unwrap a JSON body, reporting malformed input as 400 rather than axum's 422.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
    })
}

pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse().map_err(errors::domain_error_to_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use studiodesk_core::SlotId;

    #[test]
    fn invoice_overrides_are_converted_to_basis_points() {
        let options = GenerateInvoicesRequest {
            requires_deposit: Some(true),
            deposit_percent: Some(12.5),
            tax_rate: Some(10.0),
        }
        .into_options()
        .unwrap();
        assert_eq!(options.deposit_percent, Some(Percent::from_basis_points(1250)));
        assert_eq!(options.tax_rate, Some(Percent::whole(10)));
    }

    #[test]
    fn deposit_percent_over_hundred_is_rejected() {
        let request = GenerateInvoicesRequest {
            deposit_percent: Some(150.0),
            ..Default::default()
        };
        assert!(request.into_options().is_err());
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_id::<SlotId>("slot-1").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(parse_id::<SlotId>(&SlotId::new().to_string()).is_ok());
    }
}

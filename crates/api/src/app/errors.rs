use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use studiodesk_core::DomainError;
use studiodesk_infra::ProvisioningError;

pub fn provisioning_error_to_response(err: ProvisioningError) -> axum::response::Response {
    match err {
        ProvisioningError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ProvisioningError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        ProvisioningError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ProvisioningError::AlreadyBooked(msg) => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "already_booked",
                "message": msg,
                "already_booked": true,
            })),
        )
            .into_response(),
        ProvisioningError::Expired(msg) => json_error(StatusCode::GONE, "expired", msg),
        ProvisioningError::Configuration(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", msg)
        }
        ProvisioningError::ClientResolution { secured, reason } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "client_resolution_failed",
                "message": reason,
                "secured": secured,
            })),
        )
            .into_response(),
        ProvisioningError::Store(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// Malformed path or body values.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        other => provisioning_error_to_response(other.into()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

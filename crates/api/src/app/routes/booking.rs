use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use studiodesk_infra::provisioning::ReserveSlot;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Public booking: claim the slot, then provision client, job, invoices,
/// contract and emails.
pub async fn book_slot(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::BookSlotRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let slot_id = match dto::parse_id(&body.slot_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = ReserveSlot {
        slot_id,
        name: body.name,
        email: body.email,
        phone: body.phone,
    };
    match services.provisioning().reserve_slot(request).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

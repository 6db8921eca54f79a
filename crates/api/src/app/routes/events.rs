use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use studiodesk_core::BookingEventId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub async fn generate_slots(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::GenerateSlotsRequest>, JsonRejection>,
) -> axum::response::Response {
    let event_id: BookingEventId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services
        .provisioning()
        .generate_slots(tenant.tenant_id(), event_id, &body.windows)
        .await
    {
        Ok(slots) => (StatusCode::CREATED, Json(dto::SlotsCreated { slots })).into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

/// Delete an event together with its slots.
pub async fn delete_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let event_id: BookingEventId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .provisioning()
        .delete_event(tenant.tenant_id(), event_id)
        .await
    {
        Ok(removed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "slots_removed": removed })),
        )
            .into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

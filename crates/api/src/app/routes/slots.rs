use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use studiodesk_core::SlotId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub async fn block_slot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let slot_id: SlotId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.provisioning().block_slot(tenant.tenant_id(), slot_id).await {
        Ok(slot) => (StatusCode::OK, Json(slot)).into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

/// Cancels rather than deletes: the slot stays visible as canceled.
pub async fn cancel_slot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let slot_id: SlotId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.provisioning().cancel_slot(tenant.tenant_id(), slot_id).await {
        Ok(slot) => (StatusCode::OK, Json(slot)).into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

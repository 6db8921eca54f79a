use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use studiodesk_core::JobId;
use studiodesk_crm::JobStatus;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

/// Manual trigger for jobs created without invoices.
pub async fn generate_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::GenerateInvoicesRequest>, JsonRejection>,
) -> axum::response::Response {
    let job_id: JobId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let options = match body.into_options() {
        Ok(o) => o,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .provisioning()
        .generate_invoices_for_job(tenant.tenant_id(), job_id, options)
        .await
    {
        Ok(invoice_ids) => {
            (StatusCode::CREATED, Json(dto::InvoicesCreated { invoice_ids })).into_response()
        }
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::ChangeJobStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let job_id: JobId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let status: JobStatus = match body.status.trim().parse() {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .provisioning()
        .change_job_status(tenant.tenant_id(), job_id, status)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

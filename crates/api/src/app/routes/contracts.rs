use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use studiodesk_contracts::ClientSignature;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn view_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
) -> axum::response::Response {
    match services.provisioning().view_contract(&token).await {
        Ok(contract) => (StatusCode::OK, Json(dto::ContractView::from(contract))).into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

pub async fn sign_contract(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<dto::SignContractRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let signature = ClientSignature {
        signature_image: body.signature_image,
        ip_address: client_ip(&headers),
        user_agent: header_value(&headers, "user-agent"),
    };
    match services.provisioning().sign_contract(&token, signature).await {
        Ok(contract) => (StatusCode::OK, Json(dto::ContractView::from(contract))).into_response(),
        Err(e) => errors::provisioning_error_to_response(e),
    }
}

/// Tenant-side preview of arbitrary template text.
pub async fn render_contract(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::RenderContractRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let content = services.provisioning().render_contract(
        body.template.as_deref(),
        &body.tags,
        &body.conditions,
    );
    (StatusCode::OK, Json(serde_json::json!({ "content": content }))).into_response()
}

/// First hop of `X-Forwarded-For`, else `X-Real-Ip`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .filter(|v| !v.is_empty())
        .or_else(|| header_value(headers, "x-real-ip"))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }
}

use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};

use studiodesk_api::app::services::AppServices;
use studiodesk_billing::Package;
use studiodesk_core::{BookingEventId, ClientId, LeadId, Money, PackageId, Percent, TenantId};
use studiodesk_crm::{Client, ClientSource, Lead, LeadStatus, NewClient};
use studiodesk_infra::notify::InMemoryNotifier;
use studiodesk_infra::store::{CatalogStore, ClientStore, ContractStore, InMemoryStudioStore, LeadStore};
use studiodesk_infra::ProvisioningSettings;
use studiodesk_scheduling::{BookingEvent, BookingEventStatus};

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStudioStore>,
    notifier: Arc<InMemoryNotifier>,
    tenant: TenantId,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = Arc::new(InMemoryStudioStore::new());
        let notifier = Arc::new(InMemoryNotifier::new());
        let services = AppServices::in_memory(
            store.clone(),
            notifier.clone(),
            ProvisioningSettings::default(),
        );

        // Same router as prod, bound to an ephemeral port.
        let app = studiodesk_api::app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            notifier,
            tenant: TenantId::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed_event(&self) -> BookingEventId {
        let package = Package {
            id: PackageId::new(),
            tenant_id: self.tenant,
            name: "Family Mini".to_string(),
            price: Money::from_major(400),
            duration_minutes: Some(20),
            included_images: Some(10),
            require_deposit: true,
            deposit_percent: Some(Percent::whole(50)),
        };
        let event = BookingEvent {
            id: BookingEventId::new(),
            tenant_id: self.tenant,
            title: "Spring Minis".to_string(),
            description: None,
            location: Some("Botanic Gardens".to_string()),
            package_id: Some(package.id),
            custom_price: None,
            slot_duration_minutes: 20,
            buffer_minutes: 10,
            status: BookingEventStatus::Published,
            auto_create_job: true,
            auto_create_invoice: true,
            created_at: Utc::now(),
        };
        let id = event.id;
        self.store.insert_package(package).await.unwrap();
        self.store.insert_event(event).await.unwrap();
        id
    }

    async fn seed_quote(&self, token: &str) -> LeadId {
        let client = Client::create(
            ClientId::new(),
            NewClient {
                tenant_id: self.tenant,
                full_name: "Jamie Fox".to_string(),
                email: "jamie@example.com".to_string(),
                phone: None,
                source: ClientSource::Quote,
            },
            Utc::now(),
        )
        .unwrap();
        let lead = Lead {
            id: LeadId::new(),
            tenant_id: self.tenant,
            client_id: Some(client.id),
            job_type: Some("Wedding".to_string()),
            preferred_date: None,
            location: None,
            source: None,
            status: LeadStatus::Quoted,
            notes: None,
            quoted_package_id: None,
            quoted_amount: Some(Money::from_major(3000)),
            quote_token: Some(token.to_string()),
            quote_accepted_at: None,
            created_at: Utc::now(),
        };
        let id = lead.id;
        self.store.insert_client(client).await.unwrap();
        self.store.insert_lead(lead).await.unwrap();
        id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn generate_slots(
    client: &reqwest::Client,
    srv: &TestServer,
    event_id: BookingEventId,
) -> Vec<String> {
    let res = client
        .post(srv.url(&format!("/events/{event_id}/slots")))
        .header("x-tenant-id", srv.tenant.to_string())
        .json(&json!({
            "windows": [{ "date": "2026-11-14", "start": "09:00:00", "end": "10:00:00" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect()
}

fn booking(slot_id: &str, email: &str) -> Value {
    json!({ "slot_id": slot_id, "name": "Sarah Lee", "email": email })
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["store"], "in_memory");
}

#[tokio::test]
async fn tenant_routes_require_tenant_header() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url(&format!("/slots/{}/block", ClientId::new())))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_flow_and_status_mapping() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let event_id = srv.seed_event().await;
    let slots = generate_slots(&client, &srv, event_id).await;
    assert_eq!(slots.len(), 2);

    // First booking wins and provisions everything.
    let res = client
        .post(srv.url("/book"))
        .json(&booking(&slots[0], "sarah@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let outcome: Value = res.json().await.unwrap();
    assert_eq!(outcome["slot_id"], slots[0].as_str());
    assert_eq!(outcome["job_number"], 1);
    assert_eq!(outcome["invoice_ids"].as_array().unwrap().len(), 2);
    assert!(outcome["contract_id"].is_string());
    assert!(outcome["issues"].as_array().unwrap().is_empty());
    assert_eq!(srv.notifier.recorded().len(), 3);

    // Second booking of the same slot conflicts.
    let res = client
        .post(srv.url("/book"))
        .json(&booking(&slots[0], "other@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    // Canceled slot reports gone.
    let res = client
        .delete(srv.url(&format!("/slots/{}", slots[1])))
        .header("x-tenant-id", srv.tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client
        .post(srv.url("/book"))
        .json(&booking(&slots[1], "late@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::GONE);

    // Unknown and malformed slots.
    let res = client
        .post(srv.url("/book"))
        .json(&booking(&PackageId::new().to_string(), "a@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = client
        .post(srv.url("/book"))
        .json(&booking("slot-1", "a@example.com"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let res = client
        .post(srv.url("/book"))
        .json(&json!({ "slot_id": slots[1] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quote_acceptance_is_idempotent_over_http() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    srv.seed_quote("tok-123").await;

    let res = client
        .post(srv.url("/quote/accept"))
        .json(&json!({ "token": "tok-123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: Value = res.json().await.unwrap();
    assert!(outcome["job_id"].is_string());

    let res = client
        .post(srv.url("/quote/accept"))
        .json(&json!({ "token": "tok-123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["already_booked"], true);

    let res = client
        .post(srv.url("/quote/accept"))
        .json(&json!({ "token": "unknown" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contract_signing_and_job_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let event_id = srv.seed_event().await;
    let slots = generate_slots(&client, &srv, event_id).await;

    let outcome: Value = client
        .post(srv.url("/book"))
        .json(&booking(&slots[0], "sarah@example.com"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let job_id = outcome["job_id"].as_str().unwrap().to_string();

    let token = srv
        .store
        .contracts_for_job(srv.tenant, job_id.parse().unwrap())
        .await
        .unwrap()
        .remove(0)
        .signing_token;

    let view: Value = client
        .get(srv.url(&format!("/contracts/sign/{token}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["status"], "viewed");

    let res = client
        .post(srv.url(&format!("/contracts/sign/{token}")))
        .header("x-forwarded-for", "203.0.113.9")
        .json(&json!({ "signature_image": "data:image/png;base64,AAAA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let signed = srv.store.get_contract_by_token(&token).await.unwrap().unwrap();
    assert_eq!(
        signed.signature_data.unwrap().ip_address.as_deref(),
        Some("203.0.113.9")
    );

    // Invoices already exist for a provisioned job.
    let res = client
        .post(srv.url(&format!("/jobs/{job_id}/invoices")))
        .header("x-tenant-id", srv.tenant.to_string())
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .patch(srv.url(&format!("/jobs/{job_id}/status")))
        .header("x-tenant-id", srv.tenant.to_string())
        .json(&json!({ "status": "canceled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let change: Value = res.json().await.unwrap();
    assert_eq!(change["slot_released"], true);

    let res = client
        .patch(srv.url(&format!("/jobs/{job_id}/status")))
        .header("x-tenant-id", srv.tenant.to_string())
        .json(&json!({ "status": "archived" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn render_and_delete_event() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/contracts/render"))
        .header("x-tenant-id", srv.tenant.to_string())
        .json(&json!({
            "template": "Hi {{client_name}}{{#if deposit}}, deposit due{{/if}}.",
            "tags": { "client_name": "Sarah" },
            "conditions": { "deposit": false }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["content"], "Hi Sarah.");

    let event_id = srv.seed_event().await;
    generate_slots(&client, &srv, event_id).await;
    let res = client
        .delete(srv.url(&format!("/events/{event_id}")))
        .header("x-tenant-id", srv.tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["slots_removed"], 2);

    let res = client
        .delete(srv.url(&format!("/events/{event_id}")))
        .header("x-tenant-id", srv.tenant.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

pub mod booking;
pub mod contracts;
pub mod events;
pub mod jobs;
pub mod quotes;
pub mod slots;
pub mod system;

/// Unauthenticated endpoints used by clients from emailed links and the
/// public booking page.
pub fn public_router() -> Router {
    Router::new()
        .route("/book", post(booking::book_slot))
        .route("/quote/accept", post(quotes::accept_quote))
        .route(
            "/contracts/sign/:token",
            get(contracts::view_contract).post(contracts::sign_contract),
        )
}

/// Router for tenant-scoped dashboard endpoints.
pub fn tenant_router() -> Router {
    Router::new()
        .route("/jobs/:id/invoices", post(jobs::generate_invoices))
        .route("/jobs/:id/status", patch(jobs::change_status))
        .route("/contracts/render", post(contracts::render_contract))
        .route("/events/:id/slots", post(events::generate_slots))
        .route("/events/:id", delete(events::delete_event))
        .route("/slots/:id/block", post(slots::block_slot))
        .route("/slots/:id", delete(slots::cancel_slot))
}

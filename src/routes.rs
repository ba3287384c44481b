use axum::{
    routing::{get, post},
    Router,
};

use crate::renegotiation::api;

pub fn api_routes() -> Router {
    Router::new()
        .route("/", get(api::describe))
        .route("/health", get(api::health))
        .route(
            "/api/renegotiations/process",
            post(api::process_renegotiations),
        )
        .route(
            "/api/contracts/open-invoices",
            post(api::list_contract_invoices),
        )
        .route("/api/invoices/renegotiate", post(api::renegotiate_invoice))
}

use axum::{Router, routing::get};

pub mod common;
pub mod customers;
pub mod invoices;
pub mod payables;
pub mod quotations;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/customers", customers::router())
        .nest("/quotations", quotations::router())
        .nest("/invoices", invoices::router())
        .nest("/payables", payables::router())
}

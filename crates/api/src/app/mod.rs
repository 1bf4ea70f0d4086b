//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, numbering, tax collaborator, rate limiter
//! - `routes/`: HTTP routes + handlers (one file per back-office area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use tillbook_auth::{Hs256JwtValidator, JwtValidator};
use tillbook_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::{AppServices, StartupError};

/// Build the full HTTP router around already wired services.
pub fn build_app(services: Arc<AppServices>, jwt: Arc<dyn JwtValidator>) -> Router {
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(auth_state, middleware::auth_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Wire services from configuration and build the router (used by `main.rs`).
pub async fn build_app_from_config(config: &AppConfig) -> Result<Router, StartupError> {
    let services = Arc::new(AppServices::from_config(config).await?);
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret().as_bytes().to_vec()));
    Ok(build_app(services, jwt))
}

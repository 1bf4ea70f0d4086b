//! Accounts payable: supplier invoices against received orders.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use tillbook_auth::Permission;
use tillbook_core::{Money, PayableId};
use tillbook_listing::{ListQuery, RawListParams};
use tillbook_payables::PayableDraft;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_payables).post(record_payable))
        .route("/dashboard", get(payables_dashboard))
        .route("/:id/payments", post(register_payment))
}

pub async fn list_payables(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<RawListParams>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::PAYABLES_READ) {
        return errors::forbidden(e);
    }
    match services.list_payables(&ListQuery::from_params(&params)).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn record_payable(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(draft): Json<PayableDraft>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::PAYABLES_WRITE) {
        return errors::forbidden(e);
    }
    match services.record_payable(&draft, Utc::now()).await {
        Ok(payable) => (StatusCode::CREATED, Json(payable)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn register_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PaymentRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::PAYABLES_WRITE) {
        return errors::forbidden(e);
    }
    let id: PayableId = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let amount = match Money::parse(&body.amount) {
        Ok(amount) => amount,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.register_payment(id, amount).await {
        Ok(payable) => (StatusCode::OK, Json(payable)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn payables_dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::PAYABLES_READ) {
        return errors::forbidden(e);
    }
    match services.payables_dashboard(Utc::now()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

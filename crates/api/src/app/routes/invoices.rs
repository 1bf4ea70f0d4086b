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
use tillbook_core::DocumentId;
use tillbook_listing::{ListQuery, RawListParams};

use crate::app::{dto, errors};
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/pay", post(pay_invoice))
        .route("/:id/void", post(void_invoice))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<RawListParams>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::INVOICES_READ) {
        return errors::forbidden(e);
    }
    match services.list_invoices(&ListQuery::from_params(&params)).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::INVOICES_READ) {
        return errors::forbidden(e);
    }
    let id: DocumentId = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    match services.get_invoice(id).await {
        Ok(invoice) => {
            let overdue = invoice.is_overdue(Utc::now().date_naive());
            (StatusCode::OK, Json(dto::InvoiceResponse { invoice: &invoice, overdue })).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn pay_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::INVOICES_WRITE) {
        return errors::forbidden(e);
    }
    let id: DocumentId = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    match services.pay_invoice(id, Utc::now()).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn void_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::INVOICES_WRITE) {
        return errors::forbidden(e);
    }
    let id: DocumentId = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    match services.void_invoice(id).await {
        Ok(invoice) => (StatusCode::OK, Json(invoice)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

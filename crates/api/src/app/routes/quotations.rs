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
use tillbook_documents::QuotationStatus;
use tillbook_infra::StoreError;
use tillbook_listing::{ListQuery, RawListParams};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_quotation).get(list_quotations))
        .route("/:id", get(get_quotation).put(update_quotation))
        .route("/:id/status", post(transition_quotation))
        .route("/:id/convert", post(convert_quotation))
}

pub async fn create_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::QuotationRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::QUOTATIONS_WRITE) {
        return errors::forbidden(e);
    }
    let draft = match body.into_draft() {
        Ok(draft) => draft,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.create_quotation(draft, Utc::now()).await {
        Ok(priced) => (
            StatusCode::CREATED,
            Json(dto::QuotationResponse {
                quotation: &priced.record,
                tax_warning: priced.tax_warning.as_deref(),
            }),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_quotations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<RawListParams>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::QUOTATIONS_READ) {
        return errors::forbidden(e);
    }
    match services.list_quotations(&ListQuery::from_params(&params)).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::QUOTATIONS_READ) {
        return errors::forbidden(e);
    }
    let id: DocumentId = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    match services.get_quotation(id).await {
        Ok(q) => (StatusCode::OK, Json(q)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Answers `{success, message}` or `{success: false, error}`.
pub async fn update_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuotationRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::QUOTATIONS_WRITE) {
        return (StatusCode::FORBIDDEN, Json(dto::UpdateOutcome::failed(e.to_string()))).into_response();
    }
    let Ok(id) = id.parse::<DocumentId>() else {
        return (StatusCode::BAD_REQUEST, Json(dto::UpdateOutcome::failed("invalid quotation id"))).into_response();
    };
    let draft = match body.into_draft() {
        Ok(draft) => draft,
        Err(e) => {
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(dto::UpdateOutcome::failed(e.to_string())))
                .into_response();
        }
    };

    match services.update_quotation(id, draft, Utc::now()).await {
        Ok(priced) => (
            StatusCode::OK,
            Json(dto::UpdateOutcome::ok(
                format!("quotation {} updated", priced.record.number),
                priced.tax_warning,
            )),
        )
            .into_response(),
        Err(e) => {
            let status = update_failure_status(&e);
            (status, Json(dto::UpdateOutcome::failed(e.to_string()))).into_response()
        }
    }
}

fn update_failure_status(err: &StoreError) -> StatusCode {
    use tillbook_core::DomainError;
    match err {
        StoreError::NotFound | StoreError::Domain(DomainError::NotFound) => StatusCode::NOT_FOUND,
        StoreError::Domain(DomainError::Conflict(_)) => StatusCode::CONFLICT,
        StoreError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn transition_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::QUOTATIONS_WRITE) {
        return errors::forbidden(e);
    }
    let id: DocumentId = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let Some(to) = QuotationStatus::parse(&body.status) else {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_status",
            format!("unknown quotation status: {}", body.status),
        );
    };
    // Conversion issues an invoice; it has its own endpoint.
    if to == QuotationStatus::Converted {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_status",
            "use the convert endpoint to convert a quotation",
        );
    }
    match services.transition_quotation(id, to, Utc::now()).await {
        Ok(q) => (StatusCode::OK, Json(q)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn convert_quotation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::QUOTATIONS_WRITE) {
        return errors::forbidden(e);
    }
    let id: DocumentId = match parse_id(&id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    match services.convert_quotation(id, Utc::now()).await {
        Ok((quotation, invoice)) => (
            StatusCode::CREATED,
            Json(dto::ConversionResponse {
                quotation: &quotation,
                invoice: &invoice,
            }),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

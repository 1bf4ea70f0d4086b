//! Customer screens. Writes arrive as urlencoded forms and answer with
//! `303 See Other`; reads answer with JSON.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Extension, Path, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use tillbook_auth::Permission;
use tillbook_core::CustomerId;
use tillbook_customers::CustomerForm;
use tillbook_infra::RateDecision;
use tillbook_infra::export::{customers_csv, export_filename};
use tillbook_listing::{ListQuery, RawListParams};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

const LIST_PATH: &str = "/customers";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route("/export", get(export_customers))
        .route("/:id", get(get_customer).post(update_customer))
        .route("/:id/delete", post(delete_customer))
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<RawListParams>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::CUSTOMERS_READ) {
        return errors::forbidden(e);
    }
    match services.list_customers(&ListQuery::from_params(&params)).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Form(form): Form<CustomerForm>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::CUSTOMERS_WRITE) {
        return errors::forbidden_form(e);
    }
    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(fields) => return errors::field_errors(&fields, Some(&form)),
    };
    match services.create_customer(draft, Utc::now()).await {
        Ok(customer) => errors::see_other(&format!("{LIST_PATH}/{}", customer.id)),
        Err(e) => errors::form_error_to_response(e, LIST_PATH),
    }
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::CUSTOMERS_READ) {
        return errors::forbidden_form(e);
    }
    let Ok(id) = id.parse::<CustomerId>() else {
        return errors::see_other(LIST_PATH);
    };
    match services.get_customer(id).await {
        Ok(customer) => {
            let form = customer.to_form();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "customer": customer, "form": form })),
            )
                .into_response()
        }
        Err(e) => errors::form_error_to_response(e, LIST_PATH),
    }
}

/// Edits are limited per user within a fixed window.
pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Form(form): Form<CustomerForm>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::CUSTOMERS_WRITE) {
        return errors::forbidden_form(e);
    }
    let Ok(id) = id.parse::<CustomerId>() else {
        return errors::see_other(LIST_PATH);
    };

    let now = Utc::now();
    if let RateDecision::Limited { retry_after } = services.check_edit_rate(&principal.user_id().to_string(), now) {
        tracing::info!(user_id = %principal.user_id(), customer_id = %id, "customer edit rate limited");
        return errors::rate_limited(retry_after);
    }

    let draft = match form.validate() {
        Ok(draft) => draft,
        Err(fields) => return errors::field_errors(&fields, Some(&form)),
    };
    match services.update_customer(id, draft, now).await {
        Ok(customer) => errors::see_other(&format!("{LIST_PATH}/{}", customer.id)),
        Err(e) => errors::form_error_to_response(e, LIST_PATH),
    }
}

pub async fn delete_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::CUSTOMERS_DELETE) {
        return errors::forbidden_form(e);
    }
    let Ok(id) = id.parse::<CustomerId>() else {
        return errors::see_other(LIST_PATH);
    };
    match services.delete_customer(id).await {
        Ok(()) => errors::see_other(LIST_PATH),
        Err(e) => errors::form_error_to_response(e, LIST_PATH),
    }
}

/// CSV of every customer matching the list filters (pagination ignored).
pub async fn export_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(params): Query<RawListParams>,
) -> Response {
    if let Err(e) = authz::require(&principal, &Permission::CUSTOMERS_EXPORT) {
        return errors::forbidden(e);
    }
    let customers = match services.export_customers(&ListQuery::from_params(&params)).await {
        Ok(customers) => customers,
        Err(e) => return errors::store_error_to_response(e),
    };
    let body = match customers_csv(&customers) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "customer export failed");
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "export_failed", "export failed");
        }
    };

    tracing::info!(user_id = %principal.user_id(), rows = customers.len(), "customers exported");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export_filename(Utc::now())),
            ),
        ],
        body,
    )
        .into_response()
}

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use serde_json::json;

use tillbook_auth::AuthzError;
use tillbook_core::{DomainError, FieldErrors};
use tillbook_infra::StoreError;
use tillbook_numbering::NumberingError;

/// Error response for JSON routes.
pub fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Duplicate { field, value } => {
            json_error(StatusCode::CONFLICT, "duplicate", format!("{field} already exists: {value}"))
        }
        StoreError::Numbering(e) => numbering_error_to_response(e),
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::Database(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage failure")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Fields(fields) => field_errors(&fields, None::<&()>),
        DomainError::Validation(msg) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
    }
}

fn numbering_error_to_response(err: NumberingError) -> Response {
    match err {
        // Retryable: the client may simply submit again.
        NumberingError::Taken { .. } => json_error(StatusCode::CONFLICT, "number_taken", err.to_string()),
        NumberingError::Overflow { .. } | NumberingError::Exhausted { .. } => {
            json_error(StatusCode::CONFLICT, "number_exhausted", err.to_string())
        }
        NumberingError::Store(_) => {
            tracing::error!(error = %err, "numbering failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "numbering_error", "could not allocate a number")
        }
    }
}

/// Error response for form routes: missing records send the browser back to
/// the list view, everything else is reported like a JSON route.
pub fn form_error_to_response(err: StoreError, list_path: &str) -> Response {
    match err {
        StoreError::NotFound | StoreError::Domain(DomainError::NotFound) | StoreError::Domain(DomainError::InvalidId(_)) => {
            see_other(list_path)
        }
        other => store_error_to_response(other),
    }
}

pub fn forbidden(err: AuthzError) -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
}

/// Authorization failure on a form route.
pub fn forbidden_form(err: AuthzError) -> Response {
    tracing::debug!(error = %err, "form request not authorized");
    see_other("/")
}

pub fn see_other(location: &str) -> Response {
    Redirect::to(location).into_response()
}

/// 422 with per-field messages and, for forms, the submitted input.
pub fn field_errors<I: Serialize>(fields: &FieldErrors, input: Option<&I>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        axum::Json(json!({
            "error": "validation_error",
            "message": fields.to_string(),
            "fields": fields,
            "input": input,
        })),
    )
        .into_response()
}

pub fn rate_limited(retry_after: chrono::Duration) -> Response {
    // Round up so clients never retry inside the window.
    let secs = (retry_after.num_milliseconds().max(0) + 999) / 1000;
    let secs = secs.max(1);
    let mut res = json_error(
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        format!("too many edits, retry in {secs}s"),
    );
    res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
    res
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(store_error_to_response(StoreError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            store_error_to_response(StoreError::duplicate("supplier_invoice", "x")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            store_error_to_response(StoreError::Domain(DomainError::conflict("walk-in"))).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            store_error_to_response(StoreError::Database("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            store_error_to_response(StoreError::Numbering(NumberingError::Taken {
                number: "CUST202500001".into(),
                attempts: 5
            }))
            .status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn form_not_found_redirects_to_list() {
        let res = form_error_to_response(StoreError::NotFound, "/customers");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/customers");
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let res = rate_limited(chrono::Duration::milliseconds(1500));
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()[header::RETRY_AFTER], "2");
    }
}

use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::Response;

use tillbook_core::DomainError;

use crate::app::errors;

/// Parse a path identifier, answering 400 on malformed input.
pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

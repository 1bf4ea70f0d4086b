use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::page::PageRequest;

/// Loose list parameters as they arrive on the query string.
///
/// Every field is optional text; normalization happens in
/// [`ListQuery::from_params`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// Normalized list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub kind: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub page: PageRequest,
}

impl ListQuery {
    /// Blank strings count as absent and malformed dates are ignored.
    pub fn from_params(params: &RawListParams) -> Self {
        Self {
            search: non_blank(params.search.as_deref()),
            status: non_blank(params.status.as_deref()).map(|s| s.to_lowercase()),
            kind: non_blank(params.kind.as_deref()).map(|s| s.to_lowercase()),
            created_from: parse_date(params.from.as_deref()),
            created_to: parse_date(params.to.as_deref()),
            page: PageRequest::from_raw(params.page.as_deref(), params.per_page.as_deref()),
        }
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            tracing::debug!(value, "ignoring malformed date filter");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_malformed_values_are_dropped() {
        let params = RawListParams {
            search: Some("   ".to_string()),
            status: Some("Active".to_string()),
            kind: Some("".to_string()),
            from: Some("2025-13-01".to_string()),
            to: Some("2025-02-28".to_string()),
            page: Some("0".to_string()),
            per_page: Some("30".to_string()),
        };
        let q = ListQuery::from_params(&params);

        assert_eq!(q.search, None);
        assert_eq!(q.status.as_deref(), Some("active"));
        assert_eq!(q.kind, None);
        assert_eq!(q.created_from, None);
        assert_eq!(q.created_to, NaiveDate::from_ymd_opt(2025, 2, 28));
        assert_eq!(q.page.page(), 1);
        assert_eq!(q.page.per_page(), 50);
    }

    #[test]
    fn empty_params_select_everything() {
        let q = ListQuery::from_params(&RawListParams::default());
        assert_eq!(q, ListQuery::default());
    }
}

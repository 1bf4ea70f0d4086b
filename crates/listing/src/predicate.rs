use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};

use tillbook_core::Entity;

use crate::page::Page;
use crate::query::ListQuery;

/// A column holding one of a fixed set of lowercase values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumColumn {
    pub column: &'static str,
    pub values: &'static [&'static str],
}

/// Which columns of a record type each filter applies to.
///
/// Column names are static so storage adapters can splice them into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSchema {
    pub search_columns: &'static [&'static str],
    pub status: Option<EnumColumn>,
    pub kind: Option<EnumColumn>,
    /// Column the `from`/`to` date range applies to.
    pub date_column: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Case-insensitive substring match on any of `columns`.
    Contains {
        columns: &'static [&'static str],
        needle: String,
    },
    Equals {
        column: &'static str,
        value: String,
    },
    /// Inclusive lower bound on the calendar date of a timestamp column.
    OnOrAfter {
        column: &'static str,
        date: NaiveDate,
    },
    /// Inclusive upper bound on the calendar date of a timestamp column.
    OnOrBefore {
        column: &'static str,
        date: NaiveDate,
    },
}

/// Conjunction of conditions; empty selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

/// Records that can be filtered in memory.
pub trait Listable: Entity {
    /// Text value of a column (used by `Contains` and `Equals`).
    fn field(&self, column: &str) -> Option<Cow<'_, str>>;

    /// Timestamp value of a column (used by date ranges).
    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>>;
}

impl Predicate {
    /// Build the predicate for `query` against `schema`.
    ///
    /// Status/type values outside the schema's allow-list are dropped rather
    /// than matched literally.
    pub fn from_query(query: &ListQuery, schema: &FilterSchema) -> Self {
        let mut conditions = Vec::new();

        if let Some(needle) = &query.search {
            if !schema.search_columns.is_empty() {
                conditions.push(Condition::Contains {
                    columns: schema.search_columns,
                    needle: needle.clone(),
                });
            }
        }

        for (value, column) in [(&query.status, schema.status), (&query.kind, schema.kind)] {
            let (Some(value), Some(column)) = (value, column) else {
                continue;
            };
            if column.values.contains(&value.as_str()) {
                conditions.push(Condition::Equals {
                    column: column.column,
                    value: value.clone(),
                });
            } else {
                tracing::debug!(column = column.column, value = %value, "ignoring unknown enum filter");
            }
        }

        if let Some(date) = query.created_from {
            conditions.push(Condition::OnOrAfter {
                column: schema.date_column,
                date,
            });
        }
        if let Some(date) = query.created_to {
            conditions.push(Condition::OnOrBefore {
                column: schema.date_column,
                date,
            });
        }

        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches<T: Listable>(&self, record: &T) -> bool {
        self.conditions.iter().all(|c| match c {
            Condition::Contains { columns, needle } => {
                let needle = needle.to_lowercase();
                columns.iter().any(|col| {
                    record
                        .field(col)
                        .is_some_and(|v| v.to_lowercase().contains(&needle))
                })
            }
            Condition::Equals { column, value } => record
                .field(column)
                .is_some_and(|v| v.eq_ignore_ascii_case(value)),
            Condition::OnOrAfter { column, date } => record
                .timestamp(column)
                .is_some_and(|ts| ts.date_naive() >= *date),
            Condition::OnOrBefore { column, date } => record
                .timestamp(column)
                .is_some_and(|ts| ts.date_naive() <= *date),
        })
    }
}

/// `%needle%` with LIKE wildcards in the needle escaped (`\` escape).
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Filter and order newest-first, with id descending as tie-break.
pub fn select<T, I>(records: I, query: &ListQuery, schema: &FilterSchema) -> Vec<T>
where
    T: Listable,
    I: IntoIterator<Item = T>,
{
    let predicate = Predicate::from_query(query, schema);
    let mut matching: Vec<T> = records.into_iter().filter(|r| predicate.matches(r)).collect();
    matching.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
    matching
}

/// [`select`], then slice out the requested page.
pub fn paginate<T, I>(records: I, query: &ListQuery, schema: &FilterSchema) -> Page<T>
where
    T: Listable,
    I: IntoIterator<Item = T>,
{
    let matching = select(records, query, schema);

    let total = matching.len() as u64;
    let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(query.page.limit()).unwrap_or(usize::MAX);
    let items = matching.into_iter().skip(offset).take(limit).collect();

    Page::new(items, total, &query.page)
}

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::NumberingError;

/// Time bucket within which a counter is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceScope {
    /// `2025`
    Year,
    /// `202503`
    YearMonth,
}

impl SequenceScope {
    pub fn key(self, date: NaiveDate) -> String {
        match self {
            SequenceScope::Year => format!("{:04}", date.year()),
            SequenceScope::YearMonth => format!("{:04}{:02}", date.year(), date.month()),
        }
    }

    fn key_len(self) -> usize {
        match self {
            SequenceScope::Year => 4,
            SequenceScope::YearMonth => 6,
        }
    }
}

/// Which kind of record a number is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Customer,
    Quotation,
    Invoice,
}

impl DocumentKind {
    pub fn format(self) -> NumberFormat {
        match self {
            DocumentKind::Customer => NumberFormat::CUSTOMER,
            DocumentKind::Quotation => NumberFormat::QUOTATION,
            DocumentKind::Invoice => NumberFormat::INVOICE,
        }
    }
}

/// Shape of a generated identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumberFormat {
    prefix: &'static str,
    scope: SequenceScope,
    width: u8,
}

impl NumberFormat {
    pub const CUSTOMER: NumberFormat = NumberFormat::new("CUST", SequenceScope::Year, 5);
    pub const QUOTATION: NumberFormat = NumberFormat::new("QT", SequenceScope::YearMonth, 4);
    pub const INVOICE: NumberFormat = NumberFormat::new("INV", SequenceScope::YearMonth, 4);

    pub const fn new(prefix: &'static str, scope: SequenceScope, width: u8) -> Self {
        Self { prefix, scope, width }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn scope(&self) -> SequenceScope {
        self.scope
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Largest counter that fits the digit width.
    pub fn max_counter(&self) -> u32 {
        10u32.saturating_pow(u32::from(self.width)).saturating_sub(1)
    }

    /// `prefix + scopeKey`, e.g. `INV202503`.
    pub fn scope_prefix(&self, date: NaiveDate) -> String {
        format!("{}{}", self.prefix, self.scope.key(date))
    }

    pub fn format(&self, date: NaiveDate, counter: u32) -> Result<DocumentNumber, NumberingError> {
        if counter == 0 || counter > self.max_counter() {
            return Err(NumberingError::Overflow {
                scope: self.scope_prefix(date),
                counter,
                width: self.width,
            });
        }
        Ok(DocumentNumber(format!(
            "{}{:0width$}",
            self.scope_prefix(date),
            counter,
            width = usize::from(self.width)
        )))
    }

    /// Split a stored identifier into `(scopeKey, counter)`.
    ///
    /// Returns `None` for identifiers of another prefix or shape (e.g. the
    /// walk-in sentinel).
    pub fn split<'a>(&self, candidate: &'a str) -> Option<(&'a str, u32)> {
        let rest = candidate.strip_prefix(self.prefix)?;
        let key_len = self.scope.key_len();
        if rest.len() != key_len + usize::from(self.width) || !rest.is_char_boundary(key_len) {
            return None;
        }
        let (key, digits) = rest.split_at(key_len);
        if !key.bytes().all(|b| b.is_ascii_digit()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let counter = digits.parse().ok()?;
        Some((key, counter))
    }

    /// Counter of `candidate` if it belongs to the scope of `date`.
    pub fn parse_counter(&self, candidate: &str, date: NaiveDate) -> Option<u32> {
        let key = self.scope.key(date);
        match self.split(candidate) {
            Some((k, counter)) if k == key => Some(counter),
            _ => None,
        }
    }
}

/// `max(existing suffix in scope) + 1`, or `1` when the scope is empty.
///
/// Comparison is numeric; identifiers outside the scope are ignored.
pub fn next_counter<'a, I>(format: &NumberFormat, date: NaiveDate, existing: I) -> Result<u32, NumberingError>
where
    I: IntoIterator<Item = &'a str>,
{
    let max = existing
        .into_iter()
        .filter_map(|n| format.parse_counter(n, date))
        .max()
        .unwrap_or(0);

    let next = max.saturating_add(1);
    if next > format.max_counter() {
        return Err(NumberingError::Overflow {
            scope: format.scope_prefix(date),
            counter: next,
            width: format.width,
        });
    }
    Ok(next)
}

/// A generated identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentNumber(String);

impl DocumentNumber {
    /// Wrap an identifier read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

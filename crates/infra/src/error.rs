use thiserror::Error;

use tillbook_core::DomainError;
use tillbook_numbering::{DuplicateKey, NumberingError};

/// Storage adapter failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Unique-constraint violation.
    #[error("duplicate {field}: {value}")]
    Duplicate { field: String, value: String },

    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Numbering(#[from] NumberingError),
}

impl StoreError {
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        StoreError::Duplicate {
            field: field.into(),
            value: value.into(),
        }
    }

    /// A unique-column clash. A second invoice for one quotation is a
    /// conflict, not a number collision to retry.
    pub fn unique_violation(field: impl Into<String>, value: impl Into<String>) -> Self {
        let field = field.into();
        if field == "quotation_id" {
            return StoreError::Domain(DomainError::conflict("quotation already has an invoice"));
        }
        StoreError::duplicate(field, value)
    }
}

impl DuplicateKey for StoreError {
    /// Only document-number collisions are worth retrying with a new number.
    fn is_duplicate_key(&self) -> bool {
        match self {
            StoreError::Duplicate { field, .. } => field.ends_with("_number"),
            StoreError::Numbering(e) => e.is_duplicate_key(),
            _ => false,
        }
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => {
            // 23505: unique violation
            if db_err.code().as_deref() == Some("23505") {
                let field = db_err
                    .constraint()
                    .map(constraint_field)
                    .unwrap_or_else(|| "unique".to_string());
                return StoreError::unique_violation(field, db_err.message());
            }
            // 23503: foreign key violation
            if db_err.code().as_deref() == Some("23503") {
                return StoreError::Domain(DomainError::conflict(crate::store::REFERENCED));
            }
            StoreError::Database(format!("database error in {operation}: {}", db_err.message()))
        }
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}

/// `customers_customer_number_key` -> `customer_number`.
fn constraint_field(constraint: &str) -> String {
    let trimmed = constraint.strip_suffix("_key").unwrap_or(constraint);
    for table in ["customers_", "quotations_", "invoices_", "payables_"] {
        if let Some(rest) = trimmed.strip_prefix(table) {
            return rest.to_string();
        }
    }
    trimmed.to_string()
}

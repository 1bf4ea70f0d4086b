//! CSV export of the customer list.

use chrono::{DateTime, Utc};
use thiserror::Error;

use tillbook_customers::{CSV_HEADERS, Customer};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv buffer flush failed: {0}")]
    Flush(String),
}

/// `customers_YYYYmmdd_HHMMSS.csv`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("customers_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Header row, then one row per customer, with standard CSV quoting.
pub fn customers_csv(customers: &[Customer]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for customer in customers {
        writer.write_record(customer.csv_row())?;
    }
    writer.into_inner().map_err(|e| ExportError::Flush(e.to_string()))
}

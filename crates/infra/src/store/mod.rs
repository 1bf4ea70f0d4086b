//! Record stores for the back-office entities.
//!
//! Every generated number column is unique; inserting a taken number fails
//! with [`StoreError::Duplicate`] so callers can retry with a fresh one.

mod memory;
mod postgres;
mod sql;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use tillbook_core::{CustomerId, DocumentId, Money, PayableId};
use tillbook_customers::Customer;
use tillbook_documents::{Invoice, Quotation};
use tillbook_listing::{ListQuery, Page};
use tillbook_payables::Payable;

use crate::StoreError;

pub(crate) const REFERENCED: &str = "record is referenced by other records";
pub(crate) const NOT_CONVERTIBLE: &str = "quotation is no longer open for conversion";

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn insert(&self, customer: &Customer) -> Result<(), StoreError>;
    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
    async fn find_by_number(&self, number: &str) -> Result<Option<Customer>, StoreError>;
    async fn update(&self, customer: &Customer) -> Result<(), StoreError>;
    async fn delete(&self, id: CustomerId) -> Result<(), StoreError>;
    async fn list(&self, query: &ListQuery) -> Result<Page<Customer>, StoreError>;
    /// Every record matching the query filters, newest first, unpaginated.
    async fn list_all(&self, query: &ListQuery) -> Result<Vec<Customer>, StoreError>;
    /// Stored numbers starting with `prefix` (one numbering scope).
    async fn numbers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
pub trait QuotationStore: Send + Sync {
    async fn insert(&self, quotation: &Quotation) -> Result<(), StoreError>;
    async fn get(&self, id: DocumentId) -> Result<Option<Quotation>, StoreError>;
    async fn update(&self, quotation: &Quotation) -> Result<(), StoreError>;
    /// Store `converted` and insert its `invoice` as one write.
    ///
    /// The stored quotation must still be sent or accepted, otherwise this
    /// fails with a conflict and nothing is written. A taken invoice number
    /// fails with [`StoreError::Duplicate`] and leaves the quotation as it was.
    async fn record_conversion(&self, converted: &Quotation, invoice: &Invoice) -> Result<(), StoreError>;
    async fn list(&self, query: &ListQuery) -> Result<Page<Quotation>, StoreError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<(), StoreError>;
    async fn get(&self, id: DocumentId) -> Result<Option<Invoice>, StoreError>;
    async fn update(&self, invoice: &Invoice) -> Result<(), StoreError>;
    async fn list(&self, query: &ListQuery) -> Result<Page<Invoice>, StoreError>;
}

#[async_trait]
pub trait PayableStore: Send + Sync {
    async fn insert(&self, payable: &Payable) -> Result<(), StoreError>;
    async fn get(&self, id: PayableId) -> Result<Option<Payable>, StoreError>;
    /// Apply a payment against the current stored balance, atomically.
    async fn apply_payment(&self, id: PayableId, amount: Money) -> Result<Payable, StoreError>;
    async fn list(&self, query: &ListQuery) -> Result<Page<Payable>, StoreError>;
    /// Payables with an outstanding balance.
    async fn open(&self) -> Result<Vec<Payable>, StoreError>;
}

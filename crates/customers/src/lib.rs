//! Customer records (CRM side of the back office).
//!
//! Pure domain logic: validation, the walk-in sentinel, and the list/export
//! shape. Persistence lives in `tillbook-infra`.

pub mod customer;

pub use customer::{
    CSV_HEADERS, CUSTOMER_FILTERS, Customer, CustomerDraft, CustomerForm, CustomerKind,
    CustomerStatus, WALK_IN_NUMBER,
};

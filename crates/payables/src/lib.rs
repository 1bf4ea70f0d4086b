//! Accounts-payable domain module.
//!
//! Supplier invoices received against inventory orders, their payments and the
//! aging summary shown on the payables dashboard. Pure domain logic: no IO.

pub mod dashboard;
pub mod payable;

pub use dashboard::{AgingBucket, BucketTotal, PayablesDashboard, dashboard};
pub use payable::{PAYABLE_FILTERS, Payable, PayableDraft, PayableStatus};

//! Priced documents: quotations and the invoices they convert into.
//!
//! Totals are computed here (`total = subtotal - discount + tax`); the tax
//! amount itself comes from an external collaborator behind [`TaxCalculator`].

pub mod invoice;
pub mod line;
pub mod quotation;
pub mod tax;
pub mod totals;

pub use invoice::{INVOICE_FILTERS, Invoice, InvoiceStatus};
pub use line::LineItem;
pub use quotation::{QUOTATION_FILTERS, Quotation, QuotationDraft, QuotationStatus};
pub use tax::{
    FlatRateTaxCalculator, TaxAssessment, TaxBreakdown, TaxCalculator, TaxError, TaxItem, TaxLine,
    TaxRequest, assess_tax,
};
pub use totals::{MoneyTotal, compute_totals};

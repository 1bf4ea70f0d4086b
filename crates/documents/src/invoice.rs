use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{CustomerId, DocumentId, DomainError, DomainResult, Entity};
use tillbook_listing::{EnumColumn, FilterSchema, Listable};
use tillbook_numbering::DocumentNumber;

use crate::line::LineItem;
use crate::tax::TaxBreakdown;
use crate::totals::MoneyTotal;

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unpaid" => Some(InvoiceStatus::Unpaid),
            "paid" => Some(InvoiceStatus::Paid),
            "void" => Some(InvoiceStatus::Void),
            _ => None,
        }
    }
}

pub const INVOICE_FILTERS: FilterSchema = FilterSchema {
    search_columns: &["invoice_number"],
    status: Some(EnumColumn {
        column: "status",
        values: &["unpaid", "paid", "void"],
    }),
    kind: None,
    date_column: "issued_at",
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: DocumentId,
    pub number: DocumentNumber,
    pub customer_id: CustomerId,
    pub quotation_id: Option<DocumentId>,
    pub status: InvoiceStatus,
    pub lines: Vec<LineItem>,
    pub tax_lines: TaxBreakdown,
    pub totals: MoneyTotal,
    pub issued_at: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Unpaid && self.due_date < today
    }

    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            InvoiceStatus::Unpaid => {
                self.status = InvoiceStatus::Paid;
                self.paid_at = Some(now);
                Ok(())
            }
            InvoiceStatus::Paid => Err(DomainError::conflict("invoice is already paid")),
            InvoiceStatus::Void => Err(DomainError::invariant("cannot pay a void invoice")),
        }
    }

    pub fn void(&mut self) -> DomainResult<()> {
        match self.status {
            InvoiceStatus::Unpaid => {
                self.status = InvoiceStatus::Void;
                Ok(())
            }
            InvoiceStatus::Paid => Err(DomainError::invariant("cannot void a paid invoice")),
            InvoiceStatus::Void => Err(DomainError::conflict("invoice is already void")),
        }
    }
}

impl Entity for Invoice {
    type Id = DocumentId;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

impl Listable for Invoice {
    fn field(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            "invoice_number" => Some(Cow::Borrowed(self.number.as_str())),
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            _ => None,
        }
    }

    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match column {
            "issued_at" => Some(self.issued_at),
            "paid_at" => self.paid_at,
            _ => None,
        }
    }
}

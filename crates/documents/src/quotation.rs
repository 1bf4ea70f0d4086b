use std::borrow::Cow;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{CustomerId, DocumentId, DomainError, DomainResult, Entity, Money};
use tillbook_listing::{EnumColumn, FilterSchema, Listable};
use tillbook_numbering::DocumentNumber;

use crate::invoice::{Invoice, InvoiceStatus};
use crate::line::LineItem;
use crate::tax::TaxBreakdown;
use crate::totals::{MoneyTotal, compute_totals};

/// Quotation status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Converted,
}

impl QuotationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Converted => "converted",
        }
    }

    /// Sent and accepted quotations can still become invoices.
    pub fn is_convertible(self) -> bool {
        matches!(self, QuotationStatus::Sent | QuotationStatus::Accepted)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(QuotationStatus::Draft),
            "sent" => Some(QuotationStatus::Sent),
            "accepted" => Some(QuotationStatus::Accepted),
            "rejected" => Some(QuotationStatus::Rejected),
            "converted" => Some(QuotationStatus::Converted),
            _ => None,
        }
    }

    /// Manual transitions; `Converted` is only reached through conversion.
    fn can_move_to(self, to: QuotationStatus) -> bool {
        use QuotationStatus::*;
        matches!(
            (self, to),
            (Draft, Sent) | (Draft, Accepted) | (Sent, Draft) | (Sent, Accepted) | (Sent, Rejected) | (Draft, Rejected)
        )
    }

    pub fn is_editable(self) -> bool {
        matches!(self, QuotationStatus::Draft | QuotationStatus::Sent)
    }
}

pub const QUOTATION_FILTERS: FilterSchema = FilterSchema {
    search_columns: &["quotation_number", "notes"],
    status: Some(EnumColumn {
        column: "status",
        values: &["draft", "sent", "accepted", "rejected", "converted"],
    }),
    kind: None,
    date_column: "created_at",
};

/// Priced input for creating or revising a quotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotationDraft {
    pub customer_id: CustomerId,
    pub lines: Vec<LineItem>,
    pub discount: Money,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Pre-sale priced document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: DocumentId,
    pub number: DocumentNumber,
    pub customer_id: CustomerId,
    pub status: QuotationStatus,
    pub lines: Vec<LineItem>,
    pub tax_lines: TaxBreakdown,
    pub totals: MoneyTotal,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub invoice_id: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn create(
        id: DocumentId,
        number: DocumentNumber,
        draft: QuotationDraft,
        tax: TaxBreakdown,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let totals = price(&draft, &tax)?;
        Ok(Self {
            id,
            number,
            customer_id: draft.customer_id,
            status: QuotationStatus::Draft,
            lines: draft.lines,
            tax_lines: tax,
            totals,
            valid_until: draft.valid_until,
            notes: draft.notes,
            invoice_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace lines, discount and tax. Only draft or sent quotations change.
    pub fn revise(&mut self, draft: QuotationDraft, tax: TaxBreakdown, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.is_editable() {
            return Err(DomainError::conflict(format!(
                "quotation is {} and can no longer be edited",
                self.status.as_str()
            )));
        }
        let totals = price(&draft, &tax)?;
        self.customer_id = draft.customer_id;
        self.lines = draft.lines;
        self.tax_lines = tax;
        self.totals = totals;
        self.valid_until = draft.valid_until;
        self.notes = draft.notes;
        self.updated_at = now;
        Ok(())
    }

    pub fn transition(&mut self, to: QuotationStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == to {
            return Ok(());
        }
        if !self.status.can_move_to(to) {
            return Err(DomainError::conflict(format!(
                "cannot move quotation from {} to {}",
                self.status.as_str(),
                to.as_str()
            )));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.valid_until.is_some_and(|d| d < today)
    }

    /// Only sent or accepted quotations that have not expired convert.
    pub fn ensure_convertible(&self, today: NaiveDate) -> DomainResult<()> {
        if !self.status.is_convertible() {
            return Err(DomainError::conflict(format!(
                "only sent or accepted quotations can be converted (status: {})",
                self.status.as_str()
            )));
        }
        if self.is_expired(today) {
            return Err(DomainError::conflict("quotation has expired"));
        }
        Ok(())
    }

    /// Issue an invoice for this quotation and mark it converted.
    pub fn convert(
        &mut self,
        invoice_id: DocumentId,
        invoice_number: DocumentNumber,
        due_in_days: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Invoice> {
        self.ensure_convertible(now.date_naive())?;
        if due_in_days < 0 {
            return Err(DomainError::validation("due_in_days cannot be negative"));
        }
        let due_date = Duration::try_days(due_in_days)
            .and_then(|d| now.date_naive().checked_add_signed(d))
            .ok_or_else(|| DomainError::validation(format!("due_in_days {due_in_days} is out of range")))?;

        let invoice = Invoice {
            id: invoice_id,
            number: invoice_number,
            customer_id: self.customer_id,
            quotation_id: Some(self.id),
            status: InvoiceStatus::Unpaid,
            lines: self.lines.clone(),
            tax_lines: self.tax_lines.clone(),
            totals: self.totals,
            issued_at: now,
            due_date,
            paid_at: None,
        };

        self.status = QuotationStatus::Converted;
        self.invoice_id = Some(invoice_id);
        self.updated_at = now;
        Ok(invoice)
    }
}

fn price(draft: &QuotationDraft, tax: &TaxBreakdown) -> DomainResult<MoneyTotal> {
    if draft.lines.is_empty() {
        return Err(DomainError::validation("a quotation needs at least one line"));
    }
    compute_totals(&draft.lines, draft.discount, tax.total()?)
}

impl Entity for Quotation {
    type Id = DocumentId;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Listable for Quotation {
    fn field(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            "quotation_number" => Some(Cow::Borrowed(self.number.as_str())),
            "notes" => self.notes.as_deref().map(Cow::Borrowed),
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            _ => None,
        }
    }

    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        match column {
            "created_at" => Some(self.created_at),
            "updated_at" => Some(self.updated_at),
            _ => None,
        }
    }
}

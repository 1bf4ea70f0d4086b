use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tillbook_core::{DomainError, DomainResult, Entity, FieldErrors, Money, PayableId};
use tillbook_listing::{EnumColumn, FilterSchema, Listable};

/// Payment status of a supplier invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayableStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PayableStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayableStatus::Unpaid => "unpaid",
            PayableStatus::Partial => "partial",
            PayableStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unpaid" => Some(PayableStatus::Unpaid),
            "partial" => Some(PayableStatus::Partial),
            "paid" => Some(PayableStatus::Paid),
            _ => None,
        }
    }

    fn for_amounts(amount: Money, paid: Money) -> Self {
        if paid.is_zero() {
            PayableStatus::Unpaid
        } else if paid < amount {
            PayableStatus::Partial
        } else {
            PayableStatus::Paid
        }
    }
}

pub const PAYABLE_FILTERS: FilterSchema = FilterSchema {
    search_columns: &["supplier_name", "supplier_invoice_no", "purchase_order_ref"],
    status: Some(EnumColumn {
        column: "status",
        values: &["unpaid", "partial", "paid"],
    }),
    kind: None,
    date_column: "received_at",
};

/// Input for recording a supplier invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableDraft {
    #[serde(default)]
    pub supplier_name: String,
    #[serde(default)]
    pub supplier_invoice_no: String,
    #[serde(default)]
    pub purchase_order_ref: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub due_date: String,
}

/// Supplier-invoice liability against a received inventory order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payable {
    pub id: PayableId,
    pub supplier_name: String,
    pub supplier_invoice_no: String,
    pub purchase_order_ref: Option<String>,
    pub amount: Money,
    pub paid: Money,
    pub due_date: NaiveDate,
    pub received_at: DateTime<Utc>,
    pub status: PayableStatus,
}

impl Payable {
    /// Validate the draft and record a new unpaid liability.
    pub fn record(id: PayableId, draft: &PayableDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut errors = FieldErrors::new();

        let supplier_name = draft.supplier_name.trim();
        if supplier_name.is_empty() {
            errors.add("supplier_name", "supplier name is required");
        }
        let supplier_invoice_no = draft.supplier_invoice_no.trim();
        if supplier_invoice_no.is_empty() {
            errors.add("supplier_invoice_no", "supplier invoice number is required");
        }

        let amount = match Money::parse(draft.amount.trim()) {
            Ok(a) if a.minor() > 0 => Some(a),
            Ok(_) => {
                errors.add("amount", "amount must be positive");
                None
            }
            Err(_) => {
                errors.add("amount", "amount is not a valid number");
                None
            }
        };

        let due_date = match NaiveDate::parse_from_str(draft.due_date.trim(), "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                errors.add("due_date", "due date must be YYYY-MM-DD");
                None
            }
        };

        match (amount, due_date) {
            (Some(amount), Some(due_date)) if errors.is_empty() => {
                let po = draft.purchase_order_ref.trim();
                Ok(Self {
                    id,
                    supplier_name: supplier_name.to_string(),
                    supplier_invoice_no: supplier_invoice_no.to_string(),
                    purchase_order_ref: (!po.is_empty()).then(|| po.to_string()),
                    amount,
                    paid: Money::zero(),
                    due_date,
                    received_at: now,
                    status: PayableStatus::Unpaid,
                })
            }
            _ => Err(DomainError::Fields(errors)),
        }
    }

    pub fn outstanding(&self) -> Money {
        Money::from_minor(self.amount.minor().saturating_sub(self.paid.minor()))
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today && self.outstanding().minor() > 0
    }

    /// Days past due as of `today`; zero when not yet due.
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days().max(0)
    }

    /// Apply a payment. Overpayment is rejected.
    pub fn register_payment(&mut self, amount: Money) -> DomainResult<()> {
        if amount.minor() <= 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if self.status == PayableStatus::Paid {
            return Err(DomainError::conflict("payable is already settled"));
        }
        let outstanding = self.outstanding();
        if amount > outstanding {
            return Err(DomainError::validation(format!(
                "payment {amount} exceeds outstanding balance {outstanding}"
            )));
        }
        self.paid = self.paid.checked_add(amount)?;
        self.status = PayableStatus::for_amounts(self.amount, self.paid);
        Ok(())
    }
}

impl Entity for Payable {
    type Id = PayableId;

    fn id(&self) -> &PayableId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

impl Listable for Payable {
    fn field(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            "supplier_name" => Some(Cow::Borrowed(self.supplier_name.as_str())),
            "supplier_invoice_no" => Some(Cow::Borrowed(self.supplier_invoice_no.as_str())),
            "purchase_order_ref" => self.purchase_order_ref.as_deref().map(Cow::Borrowed),
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            _ => None,
        }
    }

    fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        (column == "received_at").then_some(self.received_at)
    }
}

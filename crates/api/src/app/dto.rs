use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tillbook_core::{CustomerId, DomainResult, Money};
use tillbook_documents::{Invoice, LineItem, Quotation, QuotationDraft};

// -------------------------
// Request DTOs
// -------------------------

/// Amounts are minor units (cents).
#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Deserialize)]
pub struct QuotationRequest {
    pub customer_id: CustomerId,
    pub lines: Vec<LineItemRequest>,
    #[serde(default)]
    pub discount: Money,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl QuotationRequest {
    pub fn into_draft(self) -> DomainResult<QuotationDraft> {
        let lines = self
            .lines
            .into_iter()
            .map(|l| LineItem::new(l.description, l.quantity, l.unit_price))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(QuotationDraft {
            customer_id: self.customer_id,
            lines,
            discount: self.discount,
            valid_until: self.valid_until,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Decimal amount in major units, e.g. `"120.50"`.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct QuotationResponse<'a> {
    #[serde(flatten)]
    pub quotation: &'a Quotation,
    pub tax_warning: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse<'a> {
    #[serde(flatten)]
    pub invoice: &'a Invoice,
    pub overdue: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse<'a> {
    pub quotation: &'a Quotation,
    pub invoice: &'a Invoice,
}

/// Body of `PUT /quotations/{id}`.
#[derive(Debug, Serialize)]
pub struct UpdateOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_warning: Option<String>,
}

impl UpdateOutcome {
    pub fn ok(message: impl Into<String>, tax_warning: Option<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            tax_warning,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            tax_warning: None,
        }
    }
}

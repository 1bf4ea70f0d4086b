use serde::{Deserialize, Serialize};

use tillbook_core::{DomainError, DomainResult, Money, ValueObject};

/// One priced line of a quotation or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl ValueObject for LineItem {}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price: Money) -> DomainResult<Self> {
        let line = Self {
            description: description.into().trim().to_string(),
            quantity,
            unit_price,
        };
        line.validate()?;
        Ok(line)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.description.is_empty() {
            return Err(DomainError::validation("line description cannot be empty"));
        }
        if self.quantity <= 0 {
            return Err(DomainError::validation("line quantity must be positive"));
        }
        if self.unit_price.is_negative() {
            return Err(DomainError::validation("line unit price cannot be negative"));
        }
        Ok(())
    }

    /// `quantity * unit_price`.
    pub fn line_total(&self) -> DomainResult<Money> {
        self.unit_price.checked_mul_qty(self.quantity)
    }
}

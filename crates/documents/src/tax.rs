//! Tax collaborator seam.
//!
//! Tax is computed by an external service for a given item set and customer.
//! When that service fails the document is still priced: tax is treated as
//! zero and a warning travels with the result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tillbook_core::{CustomerId, DomainResult, Money};

use crate::line::LineItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRequest {
    pub customer_id: CustomerId,
    pub items: Vec<TaxItem>,
}

impl TaxRequest {
    pub fn for_lines(customer_id: CustomerId, lines: &[LineItem]) -> DomainResult<Self> {
        let items = lines
            .iter()
            .map(|l| {
                Ok(TaxItem {
                    description: l.description.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    line_total: l.line_total()?,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self { customer_id, items })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLine {
    pub name: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub lines: Vec<TaxLine>,
}

impl TaxBreakdown {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn total(&self) -> DomainResult<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, l| acc.checked_add(l.amount))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaxError {
    #[error("tax service unavailable: {0}")]
    Unavailable(String),

    #[error("tax service timed out")]
    Timeout,

    #[error("invalid tax service response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait TaxCalculator: Send + Sync {
    async fn calculate(&self, request: &TaxRequest) -> Result<TaxBreakdown, TaxError>;
}

#[async_trait]
impl<T> TaxCalculator for std::sync::Arc<T>
where
    T: TaxCalculator + ?Sized,
{
    async fn calculate(&self, request: &TaxRequest) -> Result<TaxBreakdown, TaxError> {
        (**self).calculate(request).await
    }
}

/// Tax result plus an optional non-blocking warning for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxAssessment {
    pub breakdown: TaxBreakdown,
    pub tax: Money,
    pub warning: Option<String>,
}

/// Ask the collaborator for tax; on any failure fall back to zero tax.
pub async fn assess_tax(calculator: &dyn TaxCalculator, request: &TaxRequest) -> TaxAssessment {
    let outcome = calculator
        .calculate(request)
        .await
        .and_then(|breakdown| match breakdown.total() {
            Ok(total) if !total.is_negative() => Ok((breakdown, total)),
            Ok(total) => Err(TaxError::InvalidResponse(format!("negative tax total {total}"))),
            Err(e) => Err(TaxError::InvalidResponse(e.to_string())),
        });

    match outcome {
        Ok((breakdown, tax)) => TaxAssessment {
            breakdown,
            tax,
            warning: None,
        },
        Err(e) => {
            tracing::warn!(customer_id = %request.customer_id, error = %e, "tax calculation failed; using zero tax");
            TaxAssessment {
                breakdown: TaxBreakdown::zero(),
                tax: Money::zero(),
                warning: Some(format!("Tax could not be calculated ({e}); tax was set to 0.00")),
            }
        }
    }
}

/// Single flat rate in basis points, rounded half-up to the cent.
///
/// Used for development wiring and tests in place of the external service.
#[derive(Debug, Clone)]
pub struct FlatRateTaxCalculator {
    name: String,
    rate_bps: i64,
}

impl FlatRateTaxCalculator {
    pub fn new(name: impl Into<String>, rate_bps: i64) -> Self {
        Self {
            name: name.into(),
            rate_bps,
        }
    }
}

#[async_trait]
impl TaxCalculator for FlatRateTaxCalculator {
    async fn calculate(&self, request: &TaxRequest) -> Result<TaxBreakdown, TaxError> {
        let taxable = request
            .items
            .iter()
            .try_fold(0i128, |acc, i| acc.checked_add(i128::from(i.line_total.minor())))
            .ok_or_else(|| TaxError::InvalidResponse("taxable amount overflow".to_string()))?;

        let amount = (taxable * i128::from(self.rate_bps) + 5_000) / 10_000;
        let amount = i64::try_from(amount)
            .map_err(|_| TaxError::InvalidResponse("tax amount overflow".to_string()))?;

        Ok(TaxBreakdown {
            lines: vec![TaxLine {
                name: self.name.clone(),
                amount: Money::from_minor(amount),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing(TaxError);

    #[async_trait]
    impl TaxCalculator for Failing {
        async fn calculate(&self, _request: &TaxRequest) -> Result<TaxBreakdown, TaxError> {
            Err(self.0.clone())
        }
    }

    struct Negative;

    #[async_trait]
    impl TaxCalculator for Negative {
        async fn calculate(&self, _request: &TaxRequest) -> Result<TaxBreakdown, TaxError> {
            Ok(TaxBreakdown {
                lines: vec![TaxLine {
                    name: "VAT".to_string(),
                    amount: Money::from_minor(-100),
                }],
            })
        }
    }

    fn request() -> TaxRequest {
        let lines = vec![
            LineItem::new("A", 2, Money::from_minor(10_000)).unwrap(),
            LineItem::new("B", 1, Money::from_minor(5_000)).unwrap(),
        ];
        TaxRequest::for_lines(CustomerId::new(), &lines).unwrap()
    }

    #[tokio::test]
    async fn flat_rate_rounds_half_up() {
        let calc = FlatRateTaxCalculator::new("VAT", 1_600);
        let out = assess_tax(&calc, &request()).await;
        assert_eq!(out.tax, Money::from_minor(4_000));
        assert_eq!(out.warning, None);

        let lines = vec![LineItem::new("C", 1, Money::from_minor(3)).unwrap()];
        let req = TaxRequest::for_lines(CustomerId::new(), &lines).unwrap();
        // 3 * 0.5 = 1.5 cents -> 2
        let out = assess_tax(&FlatRateTaxCalculator::new("X", 5_000), &req).await;
        assert_eq!(out.tax, Money::from_minor(2));
    }

    #[tokio::test]
    async fn failure_degrades_to_zero_tax_with_warning() {
        let out = assess_tax(&Failing(TaxError::Timeout), &request()).await;
        assert_eq!(out.tax, Money::zero());
        assert!(out.breakdown.lines.is_empty());
        assert!(out.warning.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn negative_totals_are_rejected_as_invalid() {
        let out = assess_tax(&Negative, &request()).await;
        assert_eq!(out.tax, Money::zero());
        assert!(out.warning.is_some());
    }
}

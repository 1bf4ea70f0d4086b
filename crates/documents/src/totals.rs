use serde::{Deserialize, Serialize};

use tillbook_core::{DomainError, DomainResult, Money, ValueObject};

use crate::line::LineItem;

/// Totals of a line-itemized document.
///
/// Invariant: `total == subtotal - discount + tax`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyTotal {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl ValueObject for MoneyTotal {}

/// Sum the line products, then apply discount and tax.
pub fn compute_totals(lines: &[LineItem], discount: Money, tax: Money) -> DomainResult<MoneyTotal> {
    if discount.is_negative() {
        return Err(DomainError::validation("discount cannot be negative"));
    }
    if tax.is_negative() {
        return Err(DomainError::validation("tax cannot be negative"));
    }

    let mut subtotal = Money::zero();
    for line in lines {
        line.validate()?;
        subtotal = subtotal.checked_add(line.line_total()?)?;
    }

    if discount > subtotal {
        return Err(DomainError::validation(format!(
            "discount {discount} exceeds subtotal {subtotal}"
        )));
    }

    let total = subtotal.checked_sub(discount)?.checked_add(tax)?;
    Ok(MoneyTotal {
        subtotal,
        discount,
        tax,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn major(v: i64) -> Money {
        Money::from_major(v).unwrap()
    }

    #[test]
    fn quotation_example_totals() {
        let lines = vec![
            LineItem::new("A", 2, major(100)).unwrap(),
            LineItem::new("B", 1, major(50)).unwrap(),
        ];
        let totals = compute_totals(&lines, major(10), major(9)).unwrap();
        assert_eq!(totals.subtotal, major(250));
        assert_eq!(totals.total, major(249));
    }

    #[test]
    fn empty_document_totals_are_zero() {
        let totals = compute_totals(&[], Money::zero(), Money::zero()).unwrap();
        assert_eq!(totals, MoneyTotal::default());
    }

    #[test]
    fn discount_cannot_exceed_subtotal() {
        let lines = vec![LineItem::new("A", 1, major(5)).unwrap()];
        assert!(compute_totals(&lines, major(6), Money::zero()).is_err());
        assert!(compute_totals(&lines, Money::from_minor(-1), Money::zero()).is_err());
        assert!(compute_totals(&lines, Money::zero(), Money::from_minor(-1)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: total equals subtotal - discount + tax, exactly in cents.
        #[test]
        fn total_invariant_holds(
            items in prop::collection::vec((1i64..1_000, 0i64..10_000_000), 0..20),
            discount_pct in 0i64..=100,
            tax in 0i64..10_000_000,
        ) {
            let lines: Vec<LineItem> = items
                .iter()
                .map(|(q, p)| LineItem::new("item", *q, Money::from_minor(*p)).unwrap())
                .collect();
            let subtotal: i64 = items.iter().map(|(q, p)| q * p).sum();
            let discount = Money::from_minor(subtotal * discount_pct / 100);

            let totals = compute_totals(&lines, discount, Money::from_minor(tax)).unwrap();
            prop_assert_eq!(totals.subtotal.minor(), subtotal);
            prop_assert_eq!(
                totals.total.minor(),
                totals.subtotal.minor() - totals.discount.minor() + totals.tax.minor()
            );
        }
    }
}

use chrono::NaiveDate;
use serde::Serialize;

use tillbook_core::{DomainResult, Money};

use crate::payable::Payable;

/// Window used for the "due soon" figure.
const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgingBucket {
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "1-30")]
    Days1To30,
    #[serde(rename = "31-60")]
    Days31To60,
    #[serde(rename = "61-90")]
    Days61To90,
    #[serde(rename = "90+")]
    Over90,
}

impl AgingBucket {
    pub const ALL: [AgingBucket; 5] = [
        AgingBucket::Current,
        AgingBucket::Days1To30,
        AgingBucket::Days31To60,
        AgingBucket::Days61To90,
        AgingBucket::Over90,
    ];

    pub fn for_days_overdue(days: i64) -> Self {
        match days {
            d if d <= 0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::Days1To30 => "1-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Over90 => "90+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketTotal {
    pub bucket: AgingBucket,
    pub count: u64,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayablesDashboard {
    pub total_outstanding: Money,
    pub overdue_count: u64,
    pub overdue_amount: Money,
    pub due_within_7_days: Money,
    pub buckets: Vec<BucketTotal>,
}

/// Summarize outstanding balances as of `today`. Settled payables are skipped.
pub fn dashboard<'a, I>(payables: I, today: NaiveDate) -> DomainResult<PayablesDashboard>
where
    I: IntoIterator<Item = &'a Payable>,
{
    let mut buckets: Vec<BucketTotal> = AgingBucket::ALL
        .iter()
        .map(|&bucket| BucketTotal {
            bucket,
            count: 0,
            amount: Money::zero(),
        })
        .collect();
    let mut total_outstanding = Money::zero();
    let mut overdue_count = 0;
    let mut overdue_amount = Money::zero();
    let mut due_within_7_days = Money::zero();

    for p in payables {
        let outstanding = p.outstanding();
        if outstanding.minor() <= 0 {
            continue;
        }
        total_outstanding = total_outstanding.checked_add(outstanding)?;

        if p.is_overdue(today) {
            overdue_count += 1;
            overdue_amount = overdue_amount.checked_add(outstanding)?;
        } else if (p.due_date - today).num_days() <= DUE_SOON_DAYS {
            due_within_7_days = due_within_7_days.checked_add(outstanding)?;
        }

        let bucket = AgingBucket::for_days_overdue(p.days_overdue(today));
        if let Some(slot) = buckets.iter_mut().find(|b| b.bucket == bucket) {
            slot.count += 1;
            slot.amount = slot.amount.checked_add(outstanding)?;
        }
    }

    Ok(PayablesDashboard {
        total_outstanding,
        overdue_count,
        overdue_amount,
        due_within_7_days,
        buckets,
    })
}

//! Random-suffix numbering (legacy customer-number scheme).
//!
//! A random counter within the scope is probed against existing identifiers
//! until a free one is found or the attempt budget runs out. The probe is not
//! atomic; inserts still go through a unique constraint.

use chrono::NaiveDate;
use rand::Rng;

use crate::{DocumentNumber, NumberFormat, NumberingError};

#[derive(Debug, Clone, Copy)]
pub struct RandomSuffixGenerator {
    max_attempts: u32,
}

impl Default for RandomSuffixGenerator {
    fn default() -> Self {
        Self { max_attempts: 20 }
    }
}

impl RandomSuffixGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn generate<R, F>(
        &self,
        format: &NumberFormat,
        date: NaiveDate,
        rng: &mut R,
        mut exists: F,
    ) -> Result<DocumentNumber, NumberingError>
    where
        R: Rng + ?Sized,
        F: FnMut(&str) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            let counter = rng.gen_range(1..=format.max_counter());
            let candidate = format.format(date, counter)?;
            if !exists(candidate.as_str()) {
                return Ok(candidate);
            }
            tracing::debug!(number = %candidate, attempt, "random number collision, probing again");
        }

        Err(NumberingError::Exhausted {
            scope: format.scope_prefix(date),
            attempts: self.max_attempts,
        })
    }
}

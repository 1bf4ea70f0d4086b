//! Unique-constraint-plus-retry loop for generated identifiers.

use std::future::Future;

use tracing::{info, warn};

use crate::{DocumentNumber, NumberingError};

/// Errors that can tell a unique-constraint rejection apart from other failures.
pub trait DuplicateKey {
    fn is_duplicate_key(&self) -> bool;
}

impl DuplicateKey for NumberingError {
    fn is_duplicate_key(&self) -> bool {
        matches!(self, NumberingError::Taken { .. })
    }
}

/// Allocate a number and insert the record carrying it, retrying with a fresh
/// number when the store reports the number as already taken.
///
/// At most `max_attempts` inserts are tried. Exhausting the budget yields
/// [`NumberingError::Taken`] (converted into `E`) so callers can report a
/// specific, retryable conflict instead of a generic write failure.
///
/// ```ignore
/// let customer = allocate_with_retry(
///     5,
///     || allocator.allocate(&NumberFormat::CUSTOMER, today),
///     |number| store.insert(draft.clone().into_customer(number, now)),
/// )
/// .await?;
/// ```
pub async fn allocate_with_retry<T, E, A, AFut, I, IFut>(
    max_attempts: u32,
    mut allocate: A,
    mut insert: I,
) -> Result<T, E>
where
    E: DuplicateKey + From<NumberingError>,
    A: FnMut() -> AFut,
    AFut: Future<Output = Result<DocumentNumber, E>>,
    I: FnMut(DocumentNumber) -> IFut,
    IFut: Future<Output = Result<T, E>>,
{
    let attempts = max_attempts.max(1);
    let mut last_taken = String::new();

    for attempt in 1..=attempts {
        let number = allocate().await?;
        match insert(number.clone()).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(number = %number, attempt, "number accepted after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_duplicate_key() => {
                warn!(number = %number, attempt, "number already taken, allocating another");
                last_taken = number.into_string();
            }
            Err(e) => return Err(e),
        }
    }

    Err(E::from(NumberingError::Taken {
        number: last_taken,
        attempts,
    }))
}

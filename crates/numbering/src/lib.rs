//! Document numbering (customers, quotations, invoices).
//!
//! Identifiers look like `prefix + scopeKey + zero-padded counter`, e.g.
//! `CUST202500042` or `INV2025030007`. A counter is unique within its scope
//! (a year, or a year+month).

pub mod allocator;
pub mod format;
pub mod random;
pub mod retry;

pub use allocator::{InMemorySequenceAllocator, SequenceAllocator};
pub use format::{DocumentKind, DocumentNumber, NumberFormat, SequenceScope, next_counter};
pub use random::RandomSuffixGenerator;
pub use retry::{DuplicateKey, allocate_with_retry};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NumberingError {
    /// Counter no longer fits the configured digit width for this scope.
    #[error("counter {counter} does not fit {width} digits for scope {scope}")]
    Overflow {
        scope: String,
        counter: u32,
        width: u8,
    },

    /// The random probe found no free suffix within the attempt budget.
    #[error("no free number in scope {scope} after {attempts} attempts")]
    Exhausted { scope: String, attempts: u32 },

    /// Every allocated number was rejected by the store as already taken.
    #[error("number already taken: {number} (after {attempts} attempts)")]
    Taken { number: String, attempts: u32 },

    /// The backing counter store failed.
    #[error("sequence store error: {0}")]
    Store(String),
}

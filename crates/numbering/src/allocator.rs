use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{DocumentNumber, NumberFormat, NumberingError};

/// Atomic per-scope counter.
///
/// Each call hands out a counter that no other call for the same
/// `(prefix, scopeKey)` receives. Stores still enforce a unique constraint on
/// the number column; see [`crate::allocate_with_retry`].
#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    async fn allocate(&self, format: &NumberFormat, date: NaiveDate) -> Result<DocumentNumber, NumberingError>;
}

#[async_trait]
impl<S> SequenceAllocator for Arc<S>
where
    S: SequenceAllocator + ?Sized,
{
    async fn allocate(&self, format: &NumberFormat, date: NaiveDate) -> Result<DocumentNumber, NumberingError> {
        (**self).allocate(format, date).await
    }
}

type ScopeKey = (&'static str, String);

/// In-memory allocator for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySequenceAllocator {
    counters: Mutex<HashMap<ScopeKey, u32>>,
}

impl InMemorySequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the scope counter so a stored identifier is never handed out again.
    pub fn observe(&self, format: &NumberFormat, number: &str) -> Result<(), NumberingError> {
        let Some((key, counter)) = format.split(number) else {
            return Ok(());
        };
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| NumberingError::Store("sequence lock poisoned".to_string()))?;
        let slot = counters.entry((format.prefix(), key.to_string())).or_insert(0);
        *slot = (*slot).max(counter);
        Ok(())
    }
}

#[async_trait]
impl SequenceAllocator for InMemorySequenceAllocator {
    async fn allocate(&self, format: &NumberFormat, date: NaiveDate) -> Result<DocumentNumber, NumberingError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| NumberingError::Store("sequence lock poisoned".to_string()))?;
        let slot = counters.entry((format.prefix(), format.scope().key(date))).or_insert(0);
        let next = slot.saturating_add(1);
        let number = format.format(date, next)?;
        *slot = next;
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn counters_are_independent_per_scope_and_prefix() {
        let alloc = InMemorySequenceAllocator::new();
        let march = date(2025, 3, 2);
        let april = date(2025, 4, 2);

        assert_eq!(alloc.allocate(&NumberFormat::INVOICE, march).await.unwrap().as_str(), "INV2025030001");
        assert_eq!(alloc.allocate(&NumberFormat::INVOICE, march).await.unwrap().as_str(), "INV2025030002");
        assert_eq!(alloc.allocate(&NumberFormat::INVOICE, april).await.unwrap().as_str(), "INV2025040001");
        assert_eq!(alloc.allocate(&NumberFormat::QUOTATION, march).await.unwrap().as_str(), "QT2025030001");
    }

    #[tokio::test]
    async fn observed_numbers_are_never_reissued() {
        let alloc = InMemorySequenceAllocator::new();
        let d = date(2025, 1, 10);
        alloc.observe(&NumberFormat::CUSTOMER, "CUST202500042").unwrap();
        alloc.observe(&NumberFormat::CUSTOMER, "CUST202500017").unwrap();
        alloc.observe(&NumberFormat::CUSTOMER, "WALKIN").unwrap();

        let next = alloc.allocate(&NumberFormat::CUSTOMER, d).await.unwrap();
        assert_eq!(next.as_str(), "CUST202500043");
    }

    #[tokio::test]
    async fn exhausted_scope_keeps_counter_unchanged() {
        let alloc = InMemorySequenceAllocator::new();
        let d = date(2025, 1, 10);
        alloc.observe(&NumberFormat::INVOICE, "INV2025019999").unwrap();

        assert!(alloc.allocate(&NumberFormat::INVOICE, d).await.is_err());
        let counters = alloc.counters.lock().unwrap();
        assert_eq!(counters[&(NumberFormat::INVOICE.prefix(), "202501".to_string())], 9999);
    }

    #[tokio::test]
    async fn concurrent_allocations_are_unique() {
        let alloc = Arc::new(InMemorySequenceAllocator::new());
        let d = date(2025, 7, 1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let alloc = alloc.clone();
            handles.push(tokio::spawn(async move {
                let mut out = Vec::new();
                for _ in 0..50 {
                    out.push(alloc.allocate(&NumberFormat::INVOICE, d).await.unwrap());
                }
                out
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            for n in h.await.unwrap() {
                assert!(seen.insert(n), "duplicate number allocated");
            }
        }
        assert_eq!(seen.len(), 400);
    }
}

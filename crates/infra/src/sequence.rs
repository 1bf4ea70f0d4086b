//! Postgres-backed document sequence allocator.
//!
//! The counter for `(prefix, scope key)` is advanced with a single upsert, so
//! concurrent requests never receive the same counter. Records still carry a
//! unique constraint on their number column and go through
//! `allocate_with_retry`, which covers counters seeded behind imported data.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use tracing::debug;

use tillbook_numbering::{DocumentNumber, NumberFormat, NumberingError, SequenceAllocator};

#[derive(Debug, Clone)]
pub struct PostgresSequenceAllocator {
    pool: PgPool,
}

impl PostgresSequenceAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceAllocator for PostgresSequenceAllocator {
    async fn allocate(&self, format: &NumberFormat, date: NaiveDate) -> Result<DocumentNumber, NumberingError> {
        let scope_key = format.scope().key(date);
        let counter: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (prefix, scope_key, counter)
            VALUES ($1, $2, 1)
            ON CONFLICT (prefix, scope_key)
            DO UPDATE SET counter = document_sequences.counter + 1
            RETURNING counter
            "#,
        )
        .bind(format.prefix())
        .bind(&scope_key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NumberingError::Store(e.to_string()))?;

        let counter = u32::try_from(counter)
            .map_err(|_| NumberingError::Store(format!("negative counter {counter} for {scope_key}")))?;
        debug!(prefix = format.prefix(), scope_key = %scope_key, counter, "sequence advanced");
        format.format(date, counter)
    }
}

//! Document number allocation
//!
//! Counters are keyed by (prefix, order_type, year). The Postgres allocator
//! increments and reads in one statement so two callers can never observe the
//! same value.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use shared::TransferError;
use sqlx::PgPool;

use crate::error::{is_conflict, AppError, AppResult};

#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    /// Prefix the counters belong to
    fn prefix(&self) -> &str;

    /// Next value for the key; strictly increasing, never reused
    async fn allocate(&self, order_type: &str, year: i32) -> AppResult<i64>;
}

/// Durable counter in `po_number_sequences`
pub struct PgSequenceAllocator {
    db: PgPool,
    prefix: String,
    max_attempts: u32,
}

impl PgSequenceAllocator {
    pub fn new(db: PgPool, prefix: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            db,
            prefix: prefix.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    async fn increment(&self, order_type: &str, year: i32) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO po_number_sequences (prefix, order_type, year, current_sequence)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (prefix, order_type, year)
            DO UPDATE SET current_sequence = po_number_sequences.current_sequence + 1,
                          updated_at = NOW()
            RETURNING current_sequence
            "#,
        )
        .bind(&self.prefix)
        .bind(order_type)
        .bind(year)
        .fetch_one(&self.db)
        .await
    }
}

/// Errors worth another attempt: lock contention and pool exhaustion
fn is_transient(err: &sqlx::Error) -> bool {
    is_conflict(err) || matches!(err, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
}

#[async_trait]
impl SequenceAllocator for PgSequenceAllocator {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn allocate(&self, order_type: &str, year: i32) -> AppResult<i64> {
        for attempt in 1..=self.max_attempts {
            match self.increment(order_type, year).await {
                Ok(sequence) => return Ok(sequence),
                Err(err) if is_transient(&err) => {
                    tracing::warn!(order_type, year, attempt, error = %err, "Sequence allocation failed");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(err) => return Err(AppError::DatabaseError(err)),
            }
        }

        Err(TransferError::SequenceExhaustion {
            order_type: order_type.to_string(),
            year,
            attempts: self.max_attempts,
        }
        .into())
    }
}

/// Process-local counters
pub struct InMemorySequenceAllocator {
    prefix: String,
    counters: Mutex<HashMap<(String, i32), i64>>,
}

impl InMemorySequenceAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counters: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SequenceAllocator for InMemorySequenceAllocator {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn allocate(&self, order_type: &str, year: i32) -> AppResult<i64> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| AppError::Internal("sequence counters poisoned".into()))?;
        let current = counters.entry((order_type.to_string(), year)).or_insert(0);
        *current += 1;
        Ok(*current)
    }
}

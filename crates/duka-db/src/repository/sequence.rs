//! # Sale Sequence Repository
//!
//! Per-shop monotonic counter behind sale numbers. One upsert both creates
//! the shop's row and hands out the next value, so two concurrent sales
//! never receive the same number.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SaleSequenceRepository {
    pool: SqlitePool,
}

impl SaleSequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleSequenceRepository { pool }
    }

    /// Returns the shop's next sequence value, starting at 1.
    pub async fn next_value(&self, shop_id: &str) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sale_sequences (shop_id, last_value) VALUES (?, 1)
            ON CONFLICT (shop_id) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(shop_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(shop_id = %shop_id, value, "Allocated sale sequence value");
        Ok(value)
    }
}

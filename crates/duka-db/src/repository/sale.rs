//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. INSERT SALE          insert_sale()   → status: completed           │
//! │  2. INSERT ITEMS         insert_items()  → one bulk INSERT             │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL                                                  │
//! │     └── transition_status(completed → cancelling)  ← guard             │
//! │     └── transition_status(cancelling → cancelled)                      │
//! │                                                                         │
//! │  Rollback of a failed creation:                                        │
//! │     └── delete_items() then delete_sale()                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{PaymentMethod, Sale, SaleItem, SaleStatus};

const DEFAULT_LIST_LIMIT: u32 = 50;

/// Filter for [`SaleRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub customer_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale row.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - sale number already used in the shop
    pub async fn insert_sale(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, sale_number = %sale.sale_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, shop_id, customer_id, sale_number,
                total_amount_cents, discount_amount_cents, tax_amount_cents, final_amount_cents,
                payment_method, status, notes, actor_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.shop_id)
        .bind(&sale.customer_id)
        .bind(&sale.sale_number)
        .bind(sale.total_amount_cents)
        .bind(sale.discount_amount_cents)
        .bind(sale.tax_amount_cents)
        .bind(sale.final_amount_cents)
        .bind(sale.payment_method)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(&sale.actor_id)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts all of a sale's items in one statement.
    ///
    /// Either every item is written or none is.
    pub async fn insert_items(&self, items: &[SaleItem]) -> DbResult<()> {
        let Some(first) = items.first() else {
            return Ok(());
        };
        debug!(sale_id = %first.sale_id, count = items.len(), "Inserting sale items");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"INSERT INTO sale_items (
                id, sale_id, product_id, quantity, unit_price_cents,
                discount_amount_cents, total_price_cents, created_at
            ) "#,
        );
        qb.push_values(items, |mut row, item| {
            row.push_bind(&item.id)
                .push_bind(&item.sale_id)
                .push_bind(&item.product_id)
                .push_bind(item.quantity)
                .push_bind(item.unit_price_cents)
                .push_bind(item.discount_amount_cents)
                .push_bind(item.total_price_cents)
                .push_bind(item.created_at);
        });

        qb.build().execute(&self.pool).await?;

        Ok(())
    }

    /// Gets a sale of the shop by ID.
    pub async fn get_by_id(&self, shop_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ? AND shop_id = ?")
            .bind(id)
            .bind(shop_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets the items of a sale in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ? ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists the shop's sales, newest first.
    pub async fn list(&self, shop_id: &str, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        debug!(shop_id = %shop_id, ?filter, "Listing sales");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM sales WHERE shop_id = ");
        qb.push_bind(shop_id);

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(customer_id) = &filter.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id.clone());
        }
        if let Some(method) = filter.payment_method {
            qb.push(" AND payment_method = ").push_bind(method);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at < ").push_bind(to);
        }

        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset.unwrap_or(0)));

        let sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;

        Ok(sales)
    }

    /// Moves a sale from `from` to `to`.
    ///
    /// ## Returns
    /// * `Ok(true)` - the sale was in `from` and is now in `to`
    /// * `Ok(false)` - the sale is missing or not in `from` (someone else
    ///   moved it first)
    pub async fn transition_status(
        &self,
        shop_id: &str,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<bool> {
        debug!(id = %id, %from, %to, "Transitioning sale status");

        let result = sqlx::query(
            "UPDATE sales SET status = ?, updated_at = ? WHERE id = ? AND shop_id = ? AND status = ?",
        )
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes a sale's items. Only used to roll back a failed creation.
    pub async fn delete_items(&self, sale_id: &str) -> DbResult<u64> {
        debug!(sale_id = %sale_id, "Deleting sale items");

        let result = sqlx::query("DELETE FROM sale_items WHERE sale_id = ?")
            .bind(sale_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes a sale row. Only used to roll back a failed creation.
    pub async fn delete_sale(&self, shop_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ? AND shop_id = ?")
            .bind(id)
            .bind(shop_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    /// Counts the shop's sales (for diagnostics and tests).
    pub async fn count(&self, shop_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE shop_id = ?")
            .bind(shop_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Stock Movement Repository
//!
//! The append-only stock audit log. There is no update or delete here, and
//! the schema's triggers reject both.
//!
//! ## Replay
//! ```text
//! movement  action      prev → new   delta
//! ────────  ──────────  ───────────  ─────
//! m1        purchase       0 → 10     +10
//! m2        sale          10 → 7       -3
//! m3        adjustment     7 → 10      +3   (sale cancelled)
//!                                     ─────
//!                          Σ delta =   10  == products.stock_quantity
//! ```

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::{StockAction, StockMovement};

/// Filter for [`StockMovementRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub action: Option<StockAction>,
    pub limit: Option<u32>,
}

/// Repository for stock movements.
#[derive(Debug, Clone)]
pub struct StockMovementRepository {
    pool: SqlitePool,
}

impl StockMovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockMovementRepository { pool }
    }

    /// Appends a movement.
    pub async fn insert(&self, movement: &StockMovement) -> DbResult<()> {
        debug!(
            product_id = %movement.product_id,
            action = %movement.action,
            previous = movement.previous_quantity,
            new = movement.new_quantity,
            "Appending stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, shop_id, product_id, action, quantity,
                previous_quantity, new_quantity, notes, actor_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.shop_id)
        .bind(&movement.product_id)
        .bind(movement.action)
        .bind(movement.quantity)
        .bind(movement.previous_quantity)
        .bind(movement.new_quantity)
        .bind(&movement.notes)
        .bind(&movement.actor_id)
        .bind(movement.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists the shop's movements, newest first.
    pub async fn list(&self, shop_id: &str, filter: &MovementFilter, default_limit: u32) -> DbResult<Vec<StockMovement>> {
        debug!(shop_id = %shop_id, ?filter, "Listing stock movements");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM stock_movements WHERE shop_id = ");
        qb.push_bind(shop_id);

        if let Some(product_id) = &filter.product_id {
            qb.push(" AND product_id = ").push_bind(product_id.clone());
        }
        if let Some(action) = filter.action {
            qb.push(" AND action = ").push_bind(action);
        }

        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(filter.limit.unwrap_or(default_limit)));

        let movements = qb
            .build_query_as::<StockMovement>()
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Sum of every movement's signed delta for a product.
    pub async fn sum_deltas(&self, shop_id: &str, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(new_quantity - previous_quantity), 0)
            FROM stock_movements
            WHERE shop_id = ? AND product_id = ?
            "#,
        )
        .bind(shop_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    pub async fn count_for_product(&self, shop_id: &str, product_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock_movements WHERE shop_id = ? AND product_id = ?",
        )
        .bind(shop_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Utc;
    use duka_core::{new_id, Product};

    async fn seeded() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let product = db
            .products()
            .insert(&Product {
                id: new_id(),
                shop_id: "shop-1".to_string(),
                category_id: None,
                name: "Tea 250g".to_string(),
                barcode: None,
                sku: None,
                unit: "pcs".to_string(),
                cost_price_cents: 300,
                selling_price_cents: 450,
                stock_quantity: 0,
                min_stock_level: 0,
                max_stock_level: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (db, product)
    }

    #[tokio::test]
    async fn test_sum_and_order() {
        let (db, p) = seeded().await;
        let repo = db.movements();

        for (action, prev, new) in [
            (StockAction::Purchase, 0, 10),
            (StockAction::Sale, 10, 7),
            (StockAction::Adjustment, 7, 10),
        ] {
            repo.insert(&StockMovement::record("shop-1", &p.id, "u-1", action, prev, new, None))
                .await
                .unwrap();
        }

        assert_eq!(repo.sum_deltas("shop-1", &p.id).await.unwrap(), 10);
        assert_eq!(repo.count_for_product("shop-1", &p.id).await.unwrap(), 3);

        let history = repo.list("shop-1", &MovementFilter::default(), 100).await.unwrap();
        assert_eq!(history[0].action, StockAction::Adjustment);
        assert_eq!(history[2].action, StockAction::Purchase);

        let sales = MovementFilter {
            action: Some(StockAction::Sale),
            ..Default::default()
        };
        assert_eq!(repo.list("shop-1", &sales, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_movements_are_append_only() {
        let (db, p) = seeded().await;
        db.movements()
            .insert(&StockMovement::record("shop-1", &p.id, "u-1", StockAction::Purchase, 0, 4, None))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE stock_movements SET new_quantity = 99")
            .execute(db.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM stock_movements").execute(db.pool()).await;
        assert!(delete.is_err());
    }
}

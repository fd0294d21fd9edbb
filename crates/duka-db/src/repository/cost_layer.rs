//! # Cost Layer Repository
//!
//! FIFO cost layers and the draws made against them.
//!
//! ```text
//! product P, oldest first:
//!   L1  initial_stock  10 @ 1.80   remaining 10
//!   L2  purchase        5 @ 2.00   remaining  5
//!
//! sell 12 (FIFO draw enabled):
//!   L1  remaining 0    draw(sale, item, L1, 10 @ 1.80)
//!   L2  remaining 3    draw(sale, item, L2,  2 @ 2.00)
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{CostLayer, CostLayerDraw};

/// Repository for cost layers and cost layer draws.
#[derive(Debug, Clone)]
pub struct CostLayerRepository {
    pool: SqlitePool,
}

impl CostLayerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CostLayerRepository { pool }
    }

    // =========================================================================
    // Layers
    // =========================================================================

    pub async fn insert(&self, layer: &CostLayer) -> DbResult<CostLayer> {
        debug!(
            product_id = %layer.product_id,
            quantity = layer.initial_quantity,
            unit_cost_cents = layer.unit_cost_cents,
            "Inserting cost layer"
        );

        let inserted = sqlx::query_as::<_, CostLayer>(
            r#"
            INSERT INTO cost_layers (
                id, shop_id, product_id, source_type, source_id,
                unit_cost_cents, initial_quantity, remaining_quantity,
                actor_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&layer.id)
        .bind(&layer.shop_id)
        .bind(&layer.product_id)
        .bind(layer.source_type)
        .bind(&layer.source_id)
        .bind(layer.unit_cost_cents)
        .bind(layer.initial_quantity)
        .bind(layer.remaining_quantity)
        .bind(&layer.actor_id)
        .bind(layer.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    /// A product's layers in FIFO order (oldest first).
    pub async fn list(&self, shop_id: &str, product_id: &str, only_open: bool) -> DbResult<Vec<CostLayer>> {
        debug!(shop_id = %shop_id, product_id = %product_id, only_open, "Listing cost layers");

        let layers = sqlx::query_as::<_, CostLayer>(
            r#"
            SELECT * FROM cost_layers
            WHERE shop_id = ? AND product_id = ?
              AND (? = 0 OR remaining_quantity > 0)
            ORDER BY created_at, rowid
            "#,
        )
        .bind(shop_id)
        .bind(product_id)
        .bind(only_open)
        .fetch_all(&self.pool)
        .await?;

        Ok(layers)
    }

    /// Takes up to `quantity` units from a layer.
    ///
    /// Returns `None` when the layer no longer has `quantity` units left
    /// (another sale drew it first).
    pub async fn consume(&self, layer_id: &str, quantity: i64) -> DbResult<Option<CostLayer>> {
        debug!(layer_id = %layer_id, quantity, "Consuming cost layer");

        let layer = sqlx::query_as::<_, CostLayer>(
            r#"
            UPDATE cost_layers
            SET remaining_quantity = remaining_quantity - ?
            WHERE id = ? AND remaining_quantity >= ?
            RETURNING *
            "#,
        )
        .bind(quantity)
        .bind(layer_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(layer)
    }

    /// Puts drawn units back on a layer.
    pub async fn restore(&self, layer_id: &str, quantity: i64) -> DbResult<()> {
        debug!(layer_id = %layer_id, quantity, "Restoring cost layer");

        let result = sqlx::query(
            r#"
            UPDATE cost_layers
            SET remaining_quantity = remaining_quantity + ?
            WHERE id = ? AND remaining_quantity + ? <= initial_quantity
            "#,
        )
        .bind(quantity)
        .bind(layer_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::QueryFailed(format!(
                "cost layer {layer_id} cannot take back {quantity} units"
            )));
        }

        Ok(())
    }

    /// Removes a layer. Only used to undo a receipt that failed half-way.
    pub async fn delete(&self, shop_id: &str, layer_id: &str) -> DbResult<()> {
        debug!(layer_id = %layer_id, "Deleting cost layer");

        let result = sqlx::query("DELETE FROM cost_layers WHERE id = ? AND shop_id = ?")
            .bind(layer_id)
            .bind(shop_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CostLayer", layer_id));
        }

        Ok(())
    }

    // =========================================================================
    // Draws
    // =========================================================================

    pub async fn insert_draw(&self, draw: &CostLayerDraw) -> DbResult<()> {
        debug!(
            sale_id = %draw.sale_id,
            layer_id = %draw.layer_id,
            quantity = draw.quantity,
            "Recording cost layer draw"
        );

        sqlx::query(
            r#"
            INSERT INTO cost_layer_draws (
                id, shop_id, sale_id, sale_item_id, layer_id,
                quantity, unit_cost_cents, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draw.id)
        .bind(&draw.shop_id)
        .bind(&draw.sale_id)
        .bind(&draw.sale_item_id)
        .bind(&draw.layer_id)
        .bind(draw.quantity)
        .bind(draw.unit_cost_cents)
        .bind(draw.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All draws recorded for a sale, in the order they were made.
    pub async fn draws_for_sale(&self, sale_id: &str) -> DbResult<Vec<CostLayerDraw>> {
        let draws = sqlx::query_as::<_, CostLayerDraw>(
            "SELECT * FROM cost_layer_draws WHERE sale_id = ? ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(draws)
    }

    pub async fn delete_draw(&self, draw_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM cost_layer_draws WHERE id = ?")
            .bind(draw_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use duka_core::{new_id, CostLayerSource, Product};

    async fn seeded() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let product = db
            .products()
            .insert(&Product {
                id: new_id(),
                shop_id: "shop-1".to_string(),
                category_id: None,
                name: "Flour 2kg".to_string(),
                barcode: None,
                sku: None,
                unit: "pcs".to_string(),
                cost_price_cents: 180,
                selling_price_cents: 260,
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

    fn layer(product_id: &str, quantity: i64, unit_cost_cents: i64, age_secs: i64) -> CostLayer {
        CostLayer {
            id: new_id(),
            shop_id: "shop-1".to_string(),
            product_id: product_id.to_string(),
            source_type: CostLayerSource::Purchase,
            source_id: new_id(),
            unit_cost_cents,
            initial_quantity: quantity,
            remaining_quantity: quantity,
            actor_id: "u-1".to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_fifo_order_and_consume() {
        let (db, p) = seeded().await;
        let repo = db.cost_layers();

        let newer = repo.insert(&layer(&p.id, 5, 200, 10)).await.unwrap();
        let older = repo.insert(&layer(&p.id, 10, 180, 60)).await.unwrap();

        let layers = repo.list("shop-1", &p.id, false).await.unwrap();
        assert_eq!(layers[0].id, older.id);
        assert_eq!(layers[1].id, newer.id);

        let consumed = repo.consume(&older.id, 10).await.unwrap().unwrap();
        assert_eq!(consumed.remaining_quantity, 0);
        assert!(repo.consume(&older.id, 1).await.unwrap().is_none());

        let open = repo.list("shop-1", &p.id, true).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, newer.id);

        repo.restore(&older.id, 4).await.unwrap();
        // Never above the initial quantity.
        assert!(repo.restore(&older.id, 7).await.is_err());
    }
}

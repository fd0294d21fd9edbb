//! # Stock Ledger
//!
//! Every change to a product's quantity goes through here, paired with a
//! movement in the append-only audit log.
//!
//! ## One Change
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_stock_delta(P, -3)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE products SET stock = stock - 3                                  │
//! │   WHERE id = P AND stock - 3 >= 0 RETURNING *                           │
//! │       │                                                                 │
//! │       ├── no row ──► NotFound or InsufficientStock (re-read decides)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT stock_movements (10 → 7)                                        │
//! │       │                                                                 │
//! │       ├── fails ──► UPDATE stock = stock + 3 (revert), return error     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Product { stock_quantity: 7 }                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replaying a product's movements from zero always lands on its current
//! quantity.

use tracing::{debug, error, info, warn};

use crate::error::{LedgerError, LedgerResult};
use duka_core::{Product, StockAction, StockMovement, ValidationError};
use duka_db::{Database, MovementFilter};

/// Quantity changes with their audit trail.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
    history_limit: u32,
}

impl StockLedger {
    pub fn new(db: Database, history_limit: u32) -> Self {
        StockLedger { db, history_limit }
    }

    /// Applies a signed change to a product's stock and records it.
    ///
    /// ## Errors
    /// * `Validation` - `delta` is zero
    /// * `NotFound` - no such product in the shop
    /// * `InsufficientStock` - the change would take stock below zero
    pub async fn apply_stock_delta(
        &self,
        shop_id: &str,
        product_id: &str,
        actor_id: &str,
        action: StockAction,
        delta: i64,
        note: Option<String>,
    ) -> LedgerResult<Product> {
        if delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }

        let Some(product) = self
            .db
            .products()
            .apply_stock_delta(shop_id, product_id, delta)
            .await?
        else {
            return Err(self.rejection(shop_id, product_id, delta).await);
        };

        let previous = product.stock_quantity - delta;
        self.append(&product, actor_id, action, previous, delta, note)
            .await?;

        debug!(
            product_id = %product_id,
            %action,
            previous,
            new = product.stock_quantity,
            "Stock changed"
        );
        Ok(product)
    }

    /// Adds received units. Receipts only grow stock, so there is no
    /// sufficiency check.
    pub async fn record_receipt(
        &self,
        shop_id: &str,
        product_id: &str,
        actor_id: &str,
        quantity: i64,
        note: Option<String>,
    ) -> LedgerResult<Product> {
        if quantity <= 0 {
            return Err(ValidationError::must_be_positive("quantity").into());
        }

        let product = self
            .db
            .products()
            .add_stock(shop_id, product_id, quantity)
            .await?;

        let previous = product.stock_quantity - quantity;
        self.append(&product, actor_id, StockAction::Purchase, previous, quantity, note)
            .await?;

        info!(
            product_id = %product_id,
            quantity,
            new = product.stock_quantity,
            "Stock received"
        );
        Ok(product)
    }

    /// The shop's movements, newest first.
    pub async fn stock_history(
        &self,
        shop_id: &str,
        filter: &MovementFilter,
    ) -> LedgerResult<Vec<StockMovement>> {
        let movements = self
            .db
            .movements()
            .list(shop_id, filter, self.history_limit)
            .await?;
        Ok(movements)
    }

    /// Sum of every recorded delta for a product.
    pub async fn replay_quantity(&self, shop_id: &str, product_id: &str) -> LedgerResult<i64> {
        Ok(self.db.movements().sum_deltas(shop_id, product_id).await?)
    }

    /// Appends the movement for a change already applied to `product`,
    /// reverting the change if the append fails.
    async fn append(
        &self,
        product: &Product,
        actor_id: &str,
        action: StockAction,
        previous: i64,
        delta: i64,
        note: Option<String>,
    ) -> LedgerResult<()> {
        let movement = StockMovement::record(
            &product.shop_id,
            &product.id,
            actor_id,
            action,
            previous,
            product.stock_quantity,
            note,
        );

        let Err(err) = self.db.movements().insert(&movement).await else {
            return Ok(());
        };

        match self
            .db
            .products()
            .apply_stock_delta(&product.shop_id, &product.id, -delta)
            .await
        {
            Ok(Some(_)) => {
                warn!(
                    product_id = %product.id,
                    delta,
                    error = %err,
                    "Movement append failed, stock change reverted"
                );
            }
            Ok(None) => {
                error!(
                    product_id = %product.id,
                    delta,
                    error = %err,
                    "Movement append failed and stock moved since; change not reverted"
                );
            }
            Err(revert_err) => {
                error!(
                    product_id = %product.id,
                    delta,
                    error = %err,
                    revert_error = %revert_err,
                    "Movement append failed and revert failed"
                );
            }
        }

        Err(err.into())
    }

    /// Tells a missing product from one without enough stock.
    async fn rejection(&self, shop_id: &str, product_id: &str, delta: i64) -> LedgerError {
        match self.db.products().get_by_id(shop_id, product_id).await {
            Ok(Some(product)) => {
                warn!(
                    product_id = %product_id,
                    available = product.stock_quantity,
                    requested = -delta,
                    "Stock change rejected"
                );
                LedgerError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available: product.stock_quantity,
                    requested: -delta,
                }
            }
            Ok(None) => LedgerError::not_found("Product", product_id),
            Err(err) => LedgerError::from(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use duka_core::new_id;
    use duka_db::DbConfig;

    async fn setup() -> (StockLedger, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let product = db
            .products()
            .insert(&Product {
                id: new_id(),
                shop_id: "shop-1".to_string(),
                category_id: None,
                name: "Rice 5kg".to_string(),
                barcode: None,
                sku: None,
                unit: "bag".to_string(),
                cost_price_cents: 900,
                selling_price_cents: 1_200,
                stock_quantity: 0,
                min_stock_level: 0,
                max_stock_level: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (StockLedger::new(db, 100), product)
    }

    #[tokio::test]
    async fn test_changes_are_recorded() {
        let (ledger, p) = setup().await;

        ledger
            .record_receipt("shop-1", &p.id, "u-1", 10, Some("Opening".into()))
            .await
            .unwrap();
        let after = ledger
            .apply_stock_delta("shop-1", &p.id, "u-1", StockAction::Sale, -4, None)
            .await
            .unwrap();
        assert_eq!(after.stock_quantity, 6);

        let history = ledger
            .stock_history("shop-1", &MovementFilter::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, StockAction::Sale);
        assert_eq!(history[0].previous_quantity, 10);
        assert_eq!(history[0].new_quantity, 6);
        assert_eq!(history[0].quantity, 4);

        assert_eq!(ledger.replay_quantity("shop-1", &p.id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_rejections() {
        let (ledger, p) = setup().await;
        ledger.record_receipt("shop-1", &p.id, "u-1", 2, None).await.unwrap();

        let err = ledger
            .apply_stock_delta("shop-1", &p.id, "u-1", StockAction::Sale, -3, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock { available: 2, requested: 3, .. }
        ));

        let err = ledger
            .apply_stock_delta("shop-2", &p.id, "u-1", StockAction::Sale, -1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let err = ledger
            .apply_stock_delta("shop-1", &p.id, "u-1", StockAction::Adjustment, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        // Nothing but the receipt was recorded.
        assert_eq!(ledger.replay_quantity("shop-1", &p.id).await.unwrap(), 2);
    }
}

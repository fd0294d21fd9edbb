//! # Inventory Catalog
//!
//! Products and categories, and the ways stock enters the shop.
//!
//! ## Creating a Product With Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_product { name: "Sugar 1kg", stock_quantity: 10, cost: 1.80 }   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate ─► category in shop? ─► barcode free among active products?  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT product (stock 0)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cost layer: initial_stock, 10 @ 1.80, source = product id              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  receipt: purchase 0 → 10, "Initial stock"                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A step failing after the insert undoes the steps before it.

use chrono::Utc;
use tracing::{info, warn};

use crate::cost_layers::CostLayerAccountant;
use crate::error::{LedgerError, LedgerResult};
use crate::saga::{Compensation, CompensationLog, Compensator};
use crate::stock::StockLedger;
use duka_core::validation::{
    normalize_optional, validate_new_category, validate_new_product, validate_non_negative,
    validate_notes, validate_product_update, validate_quantity, validate_stock_levels,
};
use duka_core::{
    new_id, Category, CostLayerSource, DuplicateCheck, Money, NewCategory, NewProduct, Product,
    ProductUpdate, StockAction, StockReceipt, DEFAULT_UNIT,
};
use duka_db::{Database, DbError, ProductFilter};

const INITIAL_STOCK_NOTE: &str = "Initial stock";

#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
    stock: StockLedger,
    layers: CostLayerAccountant,
    duplicate_name_matches: u32,
}

impl Catalog {
    pub fn new(db: Database, stock: StockLedger, duplicate_name_matches: u32) -> Self {
        Catalog {
            layers: CostLayerAccountant::new(db.clone()),
            db,
            stock,
            duplicate_name_matches,
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Creates a product, recording any initial stock as a cost layer and a
    /// purchase movement.
    ///
    /// ## Errors
    /// * `Validation` - bad input
    /// * `NotFound` - category not in the shop
    /// * `DuplicateBarcode` - an active product already uses the barcode
    pub async fn create_product(
        &self,
        shop_id: &str,
        actor_id: &str,
        input: NewProduct,
    ) -> LedgerResult<Product> {
        validate_new_product(&input)?;

        let category_id = normalize_optional(input.category_id.as_deref());
        if let Some(category_id) = &category_id {
            self.ensure_category(shop_id, category_id).await?;
        }

        let barcode = normalize_optional(input.barcode.as_deref());
        if let Some(barcode) = &barcode {
            self.ensure_barcode_free(shop_id, barcode, None).await?;
        }

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            shop_id: shop_id.to_string(),
            category_id,
            name: input.name.trim().to_string(),
            barcode,
            sku: normalize_optional(input.sku.as_deref()),
            unit: normalize_optional(input.unit.as_deref())
                .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            cost_price_cents: input.cost_price_cents,
            selling_price_cents: input.selling_price_cents,
            stock_quantity: 0,
            min_stock_level: input.min_stock_level,
            max_stock_level: input.max_stock_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let product = self
            .db
            .products()
            .insert(&product)
            .await
            .map_err(|e| barcode_clash(e, product.barcode.as_deref()))?;

        let product = if input.stock_quantity > 0 {
            self.stock_initial(shop_id, actor_id, product, input.stock_quantity)
                .await?
        } else {
            product
        };

        info!(
            product_id = %product.id,
            shop_id = %shop_id,
            name = %product.name,
            stock = product.stock_quantity,
            "Product created"
        );
        Ok(product)
    }

    async fn stock_initial(
        &self,
        shop_id: &str,
        actor_id: &str,
        product: Product,
        quantity: i64,
    ) -> LedgerResult<Product> {
        let mut log = CompensationLog::new();
        log.record(Compensation::DeactivateProduct {
            product_id: product.id.clone(),
        });

        match self
            .layer_and_receipt(shop_id, actor_id, &product, quantity, &mut log)
            .await
        {
            Ok(product) => Ok(product),
            Err(err) => {
                warn!(
                    product_id = %product.id,
                    error = %err,
                    "Initial stock failed, undoing product creation"
                );
                self.compensator().unwind(shop_id, actor_id, log).await;
                Err(err)
            }
        }
    }

    async fn layer_and_receipt(
        &self,
        shop_id: &str,
        actor_id: &str,
        product: &Product,
        quantity: i64,
        log: &mut CompensationLog,
    ) -> LedgerResult<Product> {
        if let Some(layer) = self
            .layers
            .add_cost_layer(
                shop_id,
                &product.id,
                actor_id,
                quantity,
                product.cost_price(),
                CostLayerSource::InitialStock,
                &product.id,
            )
            .await?
        {
            log.record(Compensation::DeleteCostLayer { layer_id: layer.id });
        }

        self.stock
            .record_receipt(
                shop_id,
                &product.id,
                actor_id,
                quantity,
                Some(INITIAL_STOCK_NOTE.to_string()),
            )
            .await
    }

    /// Receives goods into stock at the cost actually paid.
    ///
    /// The receipt opens a `purchase` cost layer. A supplied unit cost also
    /// becomes the product's cost price.
    pub async fn receive_stock(
        &self,
        shop_id: &str,
        actor_id: &str,
        product_id: &str,
        receipt: StockReceipt,
    ) -> LedgerResult<Product> {
        validate_quantity(receipt.quantity)?;
        if let Some(cost) = receipt.unit_cost_cents {
            validate_non_negative("unit_cost", cost)?;
        }
        if let Some(notes) = &receipt.notes {
            validate_notes(notes)?;
        }

        let product = self.get_active(shop_id, product_id).await?;
        let unit_cost = receipt.unit_cost_cents.unwrap_or(product.cost_price_cents);
        let reference = normalize_optional(receipt.reference.as_deref());
        let source_id = reference.clone().unwrap_or_else(new_id);
        let note = normalize_optional(receipt.notes.as_deref()).or_else(|| {
            Some(match &reference {
                Some(reference) => format!("Stock received ({reference})"),
                None => "Stock received".to_string(),
            })
        });

        let mut log = CompensationLog::new();
        let result = self
            .apply_receipt(
                shop_id,
                actor_id,
                &product,
                receipt.quantity,
                unit_cost,
                &source_id,
                note,
                &mut log,
            )
            .await;

        match result {
            Ok(updated) => {
                info!(
                    product_id = %product_id,
                    quantity = receipt.quantity,
                    unit_cost = %Money::from_cents(unit_cost),
                    stock = updated.stock_quantity,
                    "Stock receipt recorded"
                );
                Ok(updated)
            }
            Err(err) => {
                warn!(product_id = %product_id, error = %err, "Stock receipt failed, undoing");
                self.compensator().unwind(shop_id, actor_id, log).await;
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_receipt(
        &self,
        shop_id: &str,
        actor_id: &str,
        product: &Product,
        quantity: i64,
        unit_cost: i64,
        source_id: &str,
        note: Option<String>,
        log: &mut CompensationLog,
    ) -> LedgerResult<Product> {
        if let Some(layer) = self
            .layers
            .add_cost_layer(
                shop_id,
                &product.id,
                actor_id,
                quantity,
                Money::from_cents(unit_cost),
                CostLayerSource::Purchase,
                source_id,
            )
            .await?
        {
            log.record(Compensation::DeleteCostLayer { layer_id: layer.id });
        }

        if unit_cost != product.cost_price_cents {
            self.db
                .products()
                .set_cost_price(shop_id, &product.id, unit_cost)
                .await?;
            log.record(Compensation::RestoreCostPrice {
                product_id: product.id.clone(),
                cost_price_cents: product.cost_price_cents,
            });
        }

        self.stock
            .record_receipt(shop_id, &product.id, actor_id, quantity, note)
            .await
    }

    /// Applies a partial update.
    ///
    /// A `stock_quantity` different from the current level is recorded as
    /// an `adjustment` movement.
    pub async fn update_product(
        &self,
        shop_id: &str,
        actor_id: &str,
        product_id: &str,
        update: ProductUpdate,
    ) -> LedgerResult<Product> {
        validate_product_update(&update)?;

        let previous = self.get_active(shop_id, product_id).await?;
        let mut product = previous.clone();

        if let Some(name) = &update.name {
            product.name = name.trim().to_string();
        }
        if let Some(barcode) = &update.barcode {
            product.barcode = normalize_optional(Some(barcode.as_str()));
        }
        if let Some(sku) = &update.sku {
            product.sku = normalize_optional(Some(sku.as_str()));
        }
        if let Some(unit) = &update.unit {
            product.unit = unit.trim().to_string();
        }
        if let Some(category_id) = &update.category_id {
            product.category_id = normalize_optional(Some(category_id.as_str()));
        }
        if let Some(cost) = update.cost_price_cents {
            product.cost_price_cents = cost;
        }
        if let Some(price) = update.selling_price_cents {
            product.selling_price_cents = price;
        }
        if let Some(min) = update.min_stock_level {
            product.min_stock_level = min;
        }
        if let Some(max) = update.max_stock_level {
            product.max_stock_level = Some(max);
        }

        validate_stock_levels(product.min_stock_level, product.max_stock_level)?;

        if update.category_id.is_some() {
            if let Some(category_id) = &product.category_id {
                self.ensure_category(shop_id, category_id).await?;
            }
        }
        if product.barcode != previous.barcode {
            if let Some(barcode) = &product.barcode {
                self.ensure_barcode_free(shop_id, barcode, Some(product_id))
                    .await?;
            }
        }

        let updated = self
            .db
            .products()
            .update_details(&product)
            .await
            .map_err(|e| barcode_clash(e, product.barcode.as_deref()))?;

        let delta = update
            .stock_quantity
            .map_or(0, |target| target - updated.stock_quantity);
        let updated = if delta == 0 {
            updated
        } else {
            let mut log = CompensationLog::new();
            log.record(Compensation::RestoreProductDetails {
                previous: Box::new(previous),
            });
            match self.count_adjustment(shop_id, actor_id, product_id, delta).await {
                Ok(adjusted) => adjusted,
                Err(err) => {
                    warn!(
                        product_id = %product_id,
                        delta,
                        error = %err,
                        "Stock count failed, restoring product details"
                    );
                    self.compensator().unwind(shop_id, actor_id, log).await;
                    return Err(err);
                }
            }
        };

        info!(product_id = %product_id, shop_id = %shop_id, "Product updated");
        Ok(updated)
    }

    async fn count_adjustment(
        &self,
        shop_id: &str,
        actor_id: &str,
        product_id: &str,
        delta: i64,
    ) -> LedgerResult<Product> {
        self.stock
            .apply_stock_delta(
                shop_id,
                product_id,
                actor_id,
                StockAction::Adjustment,
                delta,
                Some("Stock count adjustment".to_string()),
            )
            .await
    }

    /// Soft-deletes a product. Its history stays and its barcode becomes
    /// free for reuse.
    pub async fn delete_product(&self, shop_id: &str, product_id: &str) -> LedgerResult<()> {
        self.db.products().soft_delete(shop_id, product_id).await?;
        info!(product_id = %product_id, shop_id = %shop_id, "Product deleted");
        Ok(())
    }

    /// Looks for products a new one might duplicate.
    ///
    /// Heuristic only: nothing here blocks a create except an exact active
    /// barcode, which `create_product` rejects on its own.
    pub async fn check_duplicate(
        &self,
        shop_id: &str,
        barcode: Option<&str>,
        name: Option<&str>,
    ) -> LedgerResult<DuplicateCheck> {
        let products = self.db.products();

        let barcode_match = match normalize_optional(barcode) {
            Some(barcode) => products.get_active_by_barcode(shop_id, &barcode).await?,
            None => None,
        };

        let similar_names = match normalize_optional(name) {
            Some(name) => {
                products
                    .search_similar_names(
                        shop_id,
                        &name,
                        barcode_match.as_ref().map(|p| p.id.as_str()),
                        self.duplicate_name_matches,
                    )
                    .await?
            }
            None => Vec::new(),
        };

        Ok(DuplicateCheck {
            barcode_match,
            similar_names,
        })
    }

    pub async fn get_products(&self, shop_id: &str, filter: &ProductFilter) -> LedgerResult<Vec<Product>> {
        Ok(self.db.products().list(shop_id, filter).await?)
    }

    /// Any product of the shop, including soft-deleted ones.
    pub async fn get_product_by_id(&self, shop_id: &str, product_id: &str) -> LedgerResult<Product> {
        self.db
            .products()
            .get_by_id(shop_id, product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", product_id))
    }

    /// The active product with this barcode.
    pub async fn get_product_by_barcode(&self, shop_id: &str, barcode: &str) -> LedgerResult<Product> {
        self.db
            .products()
            .get_active_by_barcode(shop_id, barcode.trim())
            .await?
            .ok_or_else(|| LedgerError::not_found("Product", barcode))
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(&self, shop_id: &str, input: NewCategory) -> LedgerResult<Category> {
        validate_new_category(&input)?;

        let category = self
            .db
            .categories()
            .insert(&Category {
                id: new_id(),
                shop_id: shop_id.to_string(),
                name: input.name.trim().to_string(),
                description: normalize_optional(input.description.as_deref()),
                created_at: Utc::now(),
            })
            .await?;

        info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn list_categories(&self, shop_id: &str) -> LedgerResult<Vec<Category>> {
        Ok(self.db.categories().list(shop_id).await?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn get_active(&self, shop_id: &str, product_id: &str) -> LedgerResult<Product> {
        match self.db.products().get_by_id(shop_id, product_id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(LedgerError::not_found("Product", product_id)),
        }
    }

    async fn ensure_category(&self, shop_id: &str, category_id: &str) -> LedgerResult<()> {
        self.db
            .categories()
            .get_by_id(shop_id, category_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found("Category", category_id))
    }

    async fn ensure_barcode_free(
        &self,
        shop_id: &str,
        barcode: &str,
        exclude_id: Option<&str>,
    ) -> LedgerResult<()> {
        let conflict = self
            .db
            .products()
            .find_barcode_conflict(shop_id, barcode, exclude_id)
            .await?;

        if let Some(existing) = conflict {
            warn!(
                shop_id = %shop_id,
                barcode = %barcode,
                existing = %existing.id,
                "Duplicate barcode rejected"
            );
            return Err(LedgerError::DuplicateBarcode {
                barcode: barcode.to_string(),
            });
        }
        Ok(())
    }

    fn compensator(&self) -> Compensator {
        Compensator::new(self.db.clone(), self.stock.clone())
    }
}

/// A unique violation on insert/update means another request took the
/// barcode between the check and the write.
fn barcode_clash(err: DbError, barcode: Option<&str>) -> LedgerError {
    match (err, barcode) {
        (DbError::UniqueViolation { .. }, Some(barcode)) => LedgerError::DuplicateBarcode {
            barcode: barcode.to_string(),
        },
        (err, _) => err.into(),
    }
}

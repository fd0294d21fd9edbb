//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read, check, write (two sales both see 5, both sell 3)      │
//! │     SELECT stock_quantity ...        → 5                                │
//! │     UPDATE products SET stock_quantity = 2                             │
//! │                                                                         │
//! │  ✅ CORRECT: one conditional delta update                              │
//! │     UPDATE products                                                     │
//! │     SET stock_quantity = stock_quantity + :delta                       │
//! │     WHERE id = :id AND stock_quantity + :delta >= 0                    │
//! │     RETURNING *                                                         │
//! │                                                                         │
//! │  Sale A: 5 → 2 (1 row)   Sale B: predicate fails (0 rows) → rejected   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::Product;

/// Default page size for product listings.
const DEFAULT_LIST_LIMIT: u32 = 100;

/// Filter for [`ProductRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of name, barcode or SKU.
    pub search: Option<String>,
    pub category_id: Option<String>,
    /// Only products at or below their reorder level.
    pub low_stock_only: bool,
    /// Include soft-deleted products.
    pub include_inactive: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - an active product of the shop
    ///   already has this barcode
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(
            id = %product.id,
            shop_id = %product.shop_id,
            name = %product.name,
            "Inserting product"
        );

        let inserted = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, shop_id, category_id, name, barcode, sku, unit,
                cost_price_cents, selling_price_cents, stock_quantity,
                min_stock_level, max_stock_level, is_active,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&product.id)
        .bind(&product.shop_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.sku)
        .bind(&product.unit)
        .bind(product.cost_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.stock_quantity)
        .bind(product.min_stock_level)
        .bind(product.max_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    /// Gets a product of the shop by ID, active or not.
    pub async fn get_by_id(&self, shop_id: &str, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ? AND shop_id = ?",
        )
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets the shop's active product with exactly this barcode.
    pub async fn get_active_by_barcode(
        &self,
        shop_id: &str,
        barcode: &str,
    ) -> DbResult<Option<Product>> {
        self.find_barcode_conflict(shop_id, barcode, None).await
    }

    /// Finds an active product holding `barcode`, ignoring `exclude_id`.
    ///
    /// Used to re-check uniqueness when a product's own barcode is updated.
    pub async fn find_barcode_conflict(
        &self,
        shop_id: &str,
        barcode: &str,
        exclude_id: Option<&str>,
    ) -> DbResult<Option<Product>> {
        debug!(shop_id = %shop_id, barcode = %barcode, "Looking up barcode");

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE shop_id = ? AND barcode = ? AND is_active = 1
              AND (? IS NULL OR id <> ?)
            LIMIT 1
            "#,
        )
        .bind(shop_id)
        .bind(barcode)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Active products whose name contains `name`, case-insensitively.
    pub async fn search_similar_names(
        &self,
        shop_id: &str,
        name: &str,
        exclude_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<Product>> {
        debug!(shop_id = %shop_id, name = %name, limit, "Searching similar product names");

        let pattern = contains_pattern(name.trim());
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE shop_id = ? AND is_active = 1 AND name LIKE ? ESCAPE '\'
              AND (? IS NULL OR id <> ?)
            ORDER BY name COLLATE NOCASE
            LIMIT ?
            "#,
        )
        .bind(shop_id)
        .bind(pattern)
        .bind(exclude_id)
        .bind(exclude_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists the shop's products, ordered by name.
    pub async fn list(&self, shop_id: &str, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        debug!(shop_id = %shop_id, ?filter, "Listing products");

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM products WHERE shop_id = ");
        qb.push_bind(shop_id);

        if !filter.include_inactive {
            qb.push(" AND is_active = 1");
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = contains_pattern(search);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR barcode LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR sku LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(category_id) = &filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id.clone());
        }
        if filter.low_stock_only {
            qb.push(" AND stock_quantity <= min_stock_level");
        }

        qb.push(" ORDER BY name COLLATE NOCASE, rowid LIMIT ")
            .push_bind(i64::from(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset.unwrap_or(0)));

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Writes a product's descriptive fields and prices.
    ///
    /// `stock_quantity` and `is_active` are NOT written here; stock only
    /// changes through [`Self::apply_stock_delta`] / [`Self::add_stock`].
    pub async fn update_details(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, "Updating product details");

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                category_id = ?,
                name = ?,
                barcode = ?,
                sku = ?,
                unit = ?,
                cost_price_cents = ?,
                selling_price_cents = ?,
                min_stock_level = ?,
                max_stock_level = ?,
                updated_at = ?
            WHERE id = ? AND shop_id = ?
            RETURNING *
            "#,
        )
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.sku)
        .bind(&product.unit)
        .bind(product.cost_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.min_stock_level)
        .bind(product.max_stock_level)
        .bind(Utc::now())
        .bind(&product.id)
        .bind(&product.shop_id)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Product", &product.id))
    }

    /// Atomically applies `delta` to the stock level unless the result
    /// would be negative.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - updated row; previous level is
    ///   `stock_quantity - delta`
    /// * `Ok(None)` - product missing, other shop, or not enough stock
    pub async fn apply_stock_delta(
        &self,
        shop_id: &str,
        id: &str,
        delta: i64,
    ) -> DbResult<Option<Product>> {
        debug!(id = %id, delta, "Applying conditional stock delta");

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?, updated_at = ?
            WHERE id = ? AND shop_id = ? AND stock_quantity + ? >= 0
            RETURNING *
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Adds received units to stock. Unconditional: receipts only grow it.
    pub async fn add_stock(&self, shop_id: &str, id: &str, quantity: i64) -> DbResult<Product> {
        debug!(id = %id, quantity, "Adding received stock");

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?, updated_at = ?
            WHERE id = ? AND shop_id = ?
            RETURNING *
            "#,
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Echoes a receipt's unit cost to the product.
    pub async fn set_cost_price(&self, shop_id: &str, id: &str, cost_price_cents: i64) -> DbResult<()> {
        debug!(id = %id, cost_price_cents, "Setting cost price");

        let result = sqlx::query(
            "UPDATE products SET cost_price_cents = ?, updated_at = ? WHERE id = ? AND shop_id = ?",
        )
        .bind(cost_price_cents)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Sales and stock history still reference the row, and the barcode
    /// becomes free for a new product.
    pub async fn soft_delete(&self, shop_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ? WHERE id = ? AND shop_id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts the shop's active products (for diagnostics).
    pub async fn count(&self, shop_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE shop_id = ? AND is_active = 1")
                .bind(shop_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

/// `%text%` for `LIKE ... ESCAPE '\'`, with the wildcards in `text`
/// matched literally.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

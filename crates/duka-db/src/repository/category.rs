//! # Category Repository

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::Category;

/// Repository for product categories.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Inserts a category.
    ///
    /// Names are unique per shop ignoring case; a clash is reported as
    /// [`DbError::UniqueViolation`] on `name`.
    pub async fn insert(&self, category: &Category) -> DbResult<Category> {
        debug!(
            id = %category.id,
            shop_id = %category.shop_id,
            name = %category.name,
            "Inserting category"
        );

        let inserted = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, shop_id, name, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&category.id)
        .bind(&category.shop_id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("name", &category.name),
            other => other,
        })?;

        Ok(inserted)
    }

    pub async fn get_by_id(&self, shop_id: &str, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE id = ? AND shop_id = ?",
        )
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Lists the shop's categories by name.
    pub async fn list(&self, shop_id: &str) -> DbResult<Vec<Category>> {
        debug!(shop_id = %shop_id, "Listing categories");

        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE shop_id = ? ORDER BY name COLLATE NOCASE",
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}

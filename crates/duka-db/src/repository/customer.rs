//! # Customer Repository
//!
//! Customers and their credit balances. Balance changes are relative
//! (`credit_balance_cents + delta`) so concurrent credit sales never
//! overwrite each other.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use duka_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<Customer> {
        debug!(id = %customer.id, shop_id = %customer.shop_id, "Inserting customer");

        let inserted = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (
                id, shop_id, name, phone, email, address,
                credit_balance_cents, credit_limit_cents, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.shop_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.credit_balance_cents)
        .bind(customer.credit_limit_cents)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    pub async fn get_by_id(&self, shop_id: &str, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE id = ? AND shop_id = ?",
        )
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lists the shop's customers by name.
    pub async fn list(&self, shop_id: &str) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE shop_id = ? ORDER BY name COLLATE NOCASE",
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Adds `delta` to the credit balance.
    ///
    /// `None` if the customer doesn't exist in the shop.
    pub async fn apply_credit_delta(
        &self,
        shop_id: &str,
        id: &str,
        delta: i64,
    ) -> DbResult<Option<Customer>> {
        debug!(id = %id, delta, "Applying credit delta");

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET credit_balance_cents = credit_balance_cents + ?, updated_at = ?
            WHERE id = ? AND shop_id = ?
            RETURNING *
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Adds `amount` to the balance only if the result stays within the
    /// customer's credit limit (no limit means no bound).
    ///
    /// `None` if the customer doesn't exist or the limit would be exceeded.
    pub async fn charge_within_limit(
        &self,
        shop_id: &str,
        id: &str,
        amount: i64,
    ) -> DbResult<Option<Customer>> {
        debug!(id = %id, amount, "Charging credit within limit");

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET credit_balance_cents = credit_balance_cents + ?, updated_at = ?
            WHERE id = ? AND shop_id = ?
              AND (credit_limit_cents IS NULL OR credit_balance_cents + ? <= credit_limit_cents)
            RETURNING *
            "#,
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lowers the balance by `amount` unless that would take it below zero.
    ///
    /// `None` if the customer doesn't exist or owes less than `amount`.
    pub async fn apply_repayment(
        &self,
        shop_id: &str,
        id: &str,
        amount: i64,
    ) -> DbResult<Option<Customer>> {
        debug!(id = %id, amount, "Applying repayment");

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET credit_balance_cents = credit_balance_cents - ?, updated_at = ?
            WHERE id = ? AND shop_id = ? AND credit_balance_cents >= ?
            RETURNING *
            "#,
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(id)
        .bind(shop_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }
}

//! # Credit Ledger
//!
//! Customers and what they owe. A credit sale raises the balance by the
//! sale's final amount, its cancellation lowers it by the same amount, and
//! repayments lower it down to zero.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{LedgerError, LedgerResult};
use duka_core::validation::{normalize_optional, validate_new_customer};
use duka_core::{new_id, Customer, Money, NewCustomer, ValidationError};
use duka_db::Database;

#[derive(Debug, Clone)]
pub struct CreditLedger {
    db: Database,
}

impl CreditLedger {
    pub fn new(db: Database) -> Self {
        CreditLedger { db }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn create_customer(&self, shop_id: &str, input: NewCustomer) -> LedgerResult<Customer> {
        validate_new_customer(&input)?;

        let now = Utc::now();
        let customer = self
            .db
            .customers()
            .insert(&Customer {
                id: new_id(),
                shop_id: shop_id.to_string(),
                name: input.name.trim().to_string(),
                phone: normalize_optional(input.phone.as_deref()),
                email: normalize_optional(input.email.as_deref()),
                address: normalize_optional(input.address.as_deref()),
                credit_balance_cents: 0,
                credit_limit_cents: input.credit_limit_cents,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(customer_id = %customer.id, shop_id = %shop_id, "Customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, shop_id: &str, customer_id: &str) -> LedgerResult<Customer> {
        self.db
            .customers()
            .get_by_id(shop_id, customer_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Customer", customer_id))
    }

    pub async fn list_customers(&self, shop_id: &str) -> LedgerResult<Vec<Customer>> {
        Ok(self.db.customers().list(shop_id).await?)
    }

    // =========================================================================
    // Balance
    // =========================================================================

    /// Adds `delta` to the customer's balance in one update.
    ///
    /// A balance can only go negative when a credit sale that was already
    /// repaid gets cancelled; that is allowed and logged.
    pub async fn apply_credit_delta(
        &self,
        shop_id: &str,
        customer_id: &str,
        delta: Money,
    ) -> LedgerResult<Customer> {
        let customer = self
            .db
            .customers()
            .apply_credit_delta(shop_id, customer_id, delta.cents())
            .await?
            .ok_or_else(|| LedgerError::not_found("Customer", customer_id))?;

        if customer.credit_balance_cents < 0 {
            warn!(
                customer_id = %customer_id,
                balance = %customer.credit_balance(),
                "Customer credit balance is negative"
            );
        }

        Ok(customer)
    }

    /// Raises the balance by `amount` for a credit sale.
    ///
    /// The limit is enforced by the update itself, so two sales racing for
    /// the last of a customer's credit cannot both succeed.
    ///
    /// ## Errors
    /// * `NotFound` - no such customer in the shop
    /// * `CreditLimitExceeded` - the charge would take the balance past the limit
    pub async fn charge_credit(
        &self,
        shop_id: &str,
        customer_id: &str,
        amount: Money,
    ) -> LedgerResult<Customer> {
        let charged = self
            .db
            .customers()
            .charge_within_limit(shop_id, customer_id, amount.cents())
            .await?;
        if let Some(customer) = charged {
            return Ok(customer);
        }

        let customer = self.get_customer(shop_id, customer_id).await?;
        warn!(
            customer_id = %customer_id,
            %amount,
            balance = %customer.credit_balance(),
            "Credit charge refused at the limit"
        );
        Err(LedgerError::CreditLimitExceeded {
            customer_id: customer_id.to_string(),
            limit: customer.credit_limit().unwrap_or_else(Money::zero),
            attempted: customer.credit_balance() + amount,
        })
    }

    /// Records a repayment of `amount`, which must not exceed what is owed.
    pub async fn record_repayment(
        &self,
        shop_id: &str,
        customer_id: &str,
        amount: Money,
    ) -> LedgerResult<Customer> {
        if !amount.is_positive() {
            return Err(ValidationError::must_be_positive("amount").into());
        }

        let repaid = self
            .db
            .customers()
            .apply_repayment(shop_id, customer_id, amount.cents())
            .await?;

        match repaid {
            Some(customer) => {
                info!(
                    customer_id = %customer_id,
                    %amount,
                    balance = %customer.credit_balance(),
                    "Repayment recorded"
                );
                Ok(customer)
            }
            None => {
                let customer = self.get_customer(shop_id, customer_id).await?;
                warn!(
                    customer_id = %customer_id,
                    %amount,
                    balance = %customer.credit_balance(),
                    "Repayment exceeds balance"
                );
                Err(ValidationError::ExceedsLimit {
                    field: "amount".to_string(),
                    amount,
                    limit: customer.credit_balance(),
                }
                .into())
            }
        }
    }

    /// Checks that `amount` more credit keeps the customer within their limit.
    pub fn check_credit_limit(customer: &Customer, amount: Money) -> LedgerResult<()> {
        customer.ensure_credit_available(amount)?;
        Ok(())
    }
}

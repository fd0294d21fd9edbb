//! # Sale Transaction Coordinator
//!
//! Creates and cancels sales. A sale touches the sale row, its items, the
//! stock of every product sold, optionally the cost layers, and the
//! customer's credit balance. The store offers no transaction across those
//! writes, so each completed write records how to undo it and a failure
//! unwinds them in reverse.
//!
//! ## Creating a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate, load customer + products, price lines     (no writes)    │
//! │  2. totals, stock sufficiency, credit limit             (no writes)    │
//! │  3. INSERT sale (sale number from the shop counter)  ─► DeleteSale     │
//! │  4. INSERT items (one statement)                     ─► DeleteItems    │
//! │  5. per item: stock -qty (conditional)               ─► RestoreStock   │
//! │     [FIFO on] draw cost layers                       ─► RestoreDraws   │
//! │  6. credit sale: balance + final (bounded by limit)  ─► ReverseCredit  │
//! │                                                                         │
//! │  failure in 4..6 ─► unwind ─► SaleCreationFailed                        │
//! │     InsufficientStock / CreditLimitExceeded if step 5 or 6 lost a race  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancelling
//! ```text
//! completed ──► cancelling ──► stock back, draws back, credit back ──► cancelled
//!                   │
//!                   └── failure: undo the reversals, status back to completed
//! ```

use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::cost_layers::CostLayerAccountant;
use crate::credit::CreditLedger;
use crate::error::{LedgerError, LedgerResult};
use crate::saga::{Compensation, CompensationLog, Compensator};
use crate::stock::StockLedger;
use duka_core::pricing::{price_line, requested_quantities, PricedLine, SaleTotals};
use duka_core::validation::{normalize_optional, validate_new_sale};
use duka_core::{
    format_sale_number, new_id, Customer, Money, NewSale, Product, ProductSummary, Sale,
    SaleDetail, SaleItem, SaleItemDetail, SaleStatus, StockAction,
};
use duka_db::{Database, SaleFilter};

#[derive(Debug, Clone)]
pub struct SaleCoordinator {
    db: Database,
    stock: StockLedger,
    layers: CostLayerAccountant,
    credit: CreditLedger,
    sale_number_attempts: u32,
    consume_cost_layers: bool,
}

impl SaleCoordinator {
    pub fn new(
        db: Database,
        stock: StockLedger,
        sale_number_attempts: u32,
        consume_cost_layers: bool,
    ) -> Self {
        SaleCoordinator {
            layers: CostLayerAccountant::new(db.clone()),
            credit: CreditLedger::new(db.clone()),
            db,
            stock,
            sale_number_attempts,
            consume_cost_layers,
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Records a sale and applies its stock and credit effects.
    ///
    /// ## Errors
    /// * `Validation` - malformed request, discount above the amount
    /// * `NotFound` - customer or product not in the shop (or inactive product)
    /// * `InsufficientStock` - not enough stock, up front or lost to a
    ///   concurrent sale
    /// * `CreditLimitExceeded` - credit sale beyond the customer's limit, up
    ///   front or after a concurrent credit sale
    /// * `SaleCreationFailed` - a write failed; earlier writes were undone
    pub async fn create_sale(
        &self,
        shop_id: &str,
        actor_id: &str,
        input: NewSale,
    ) -> LedgerResult<SaleDetail> {
        validate_new_sale(&input)?;

        let customer = match normalize_optional(input.customer_id.as_deref()) {
            Some(customer_id) => Some(self.credit.get_customer(shop_id, &customer_id).await?),
            None => None,
        };
        if input.payment_method.is_credit() && customer.is_none() {
            warn!(
                shop_id = %shop_id,
                "Credit sale without a customer, no balance will change"
            );
        }

        let products = self.load_products(shop_id, &input).await?;
        let lines = price_lines(&input, &products)?;

        for (product_id, requested) in requested_quantities(&lines) {
            if let Some(product) = products.get(product_id) {
                product.ensure_available(requested)?;
            }
        }

        let totals = SaleTotals::compute(
            &lines,
            Money::from_cents(input.discount_amount_cents),
            Money::from_cents(input.tax_amount_cents),
        )?;

        if let (true, Some(customer)) = (input.payment_method.is_credit(), &customer) {
            CreditLedger::check_credit_limit(customer, totals.final_amount)?;
        }

        let now = Utc::now();
        let draft = Sale {
            id: new_id(),
            shop_id: shop_id.to_string(),
            customer_id: customer.as_ref().map(|c| c.id.clone()),
            sale_number: String::new(),
            total_amount_cents: totals.total.cents(),
            discount_amount_cents: totals.discount.cents(),
            tax_amount_cents: totals.tax.cents(),
            final_amount_cents: totals.final_amount.cents(),
            payment_method: input.payment_method,
            status: SaleStatus::Completed,
            notes: normalize_optional(input.notes.as_deref()),
            actor_id: actor_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        // First write. Nothing to undo if it fails.
        let sale = self.insert_numbered(draft).await?;

        let mut log = CompensationLog::new();
        log.record(Compensation::DeleteSale {
            sale_id: sale.id.clone(),
        });

        let items = sale_items(&sale, &lines);
        let customer = match self.apply_sale(&sale, actor_id, &items, &mut log).await {
            Ok(Some(updated)) => Some(updated),
            Ok(None) => customer,
            Err(err) => {
                warn!(
                    sale_id = %sale.id,
                    sale_number = %sale.sale_number,
                    error = %err,
                    "Sale failed, rolling back"
                );
                let unresolved = self
                    .compensator()
                    .unwind(shop_id, actor_id, log)
                    .await;
                return Err(match err {
                    LedgerError::InsufficientStock { .. }
                    | LedgerError::CreditLimitExceeded { .. } => err,
                    other => LedgerError::SaleCreationFailed {
                        reason: other.to_string(),
                        unresolved,
                    },
                });
            }
        };

        info!(
            sale_id = %sale.id,
            sale_number = %sale.sale_number,
            shop_id = %shop_id,
            final_amount = %sale.final_amount(),
            payment_method = ?sale.payment_method,
            items = items.len(),
            "Sale created"
        );

        Ok(SaleDetail {
            items: item_details(items, &products),
            customer,
            sale,
        })
    }

    /// Loads every distinct product of the request, active and in the shop.
    async fn load_products(
        &self,
        shop_id: &str,
        input: &NewSale,
    ) -> LedgerResult<HashMap<String, Product>> {
        let mut products = HashMap::new();
        for item in &input.items {
            if products.contains_key(&item.product_id) {
                continue;
            }
            match self.db.products().get_by_id(shop_id, &item.product_id).await? {
                Some(product) if product.is_active => {
                    products.insert(item.product_id.clone(), product);
                }
                _ => return Err(LedgerError::not_found("Product", &item.product_id)),
            }
        }
        Ok(products)
    }

    /// Inserts the sale under the next free number of the shop's counter.
    async fn insert_numbered(&self, mut sale: Sale) -> LedgerResult<Sale> {
        for attempt in 1..=self.sale_number_attempts {
            let sequence = self.db.sale_sequences().next_value(&sale.shop_id).await?;
            sale.sale_number = format_sale_number(sale.created_at, sequence);

            match self.db.sales().insert_sale(&sale).await {
                Ok(()) => return Ok(sale),
                Err(err) if err.is_unique_violation() => {
                    warn!(
                        shop_id = %sale.shop_id,
                        sale_number = %sale.sale_number,
                        attempt,
                        "Sale number already taken, trying the next one"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(LedgerError::SaleCreationFailed {
            reason: format!(
                "no free sale number after {} attempts",
                self.sale_number_attempts
            ),
            unresolved: 0,
        })
    }

    /// Every write after the sale row. Returns the customer when the sale
    /// moved their balance.
    async fn apply_sale(
        &self,
        sale: &Sale,
        actor_id: &str,
        items: &[SaleItem],
        log: &mut CompensationLog,
    ) -> LedgerResult<Option<Customer>> {
        let shop_id = sale.shop_id.as_str();

        self.db.sales().insert_items(items).await?;
        log.record(Compensation::DeleteSaleItems {
            sale_id: sale.id.clone(),
        });

        let note = format!("Sale {}", sale.sale_number);
        let rollback_note = format!("Rollback of sale {}", sale.sale_number);
        let mut draws_recorded = false;

        for item in items {
            self.stock
                .apply_stock_delta(
                    shop_id,
                    &item.product_id,
                    actor_id,
                    StockAction::Sale,
                    -item.quantity,
                    Some(note.clone()),
                )
                .await?;
            log.record(Compensation::RestoreStock {
                product_id: item.product_id.clone(),
                delta: item.quantity,
                note: rollback_note.clone(),
            });

            if self.consume_cost_layers {
                let drawn = self
                    .layers
                    .draw_fifo(shop_id, &item.product_id, &sale.id, &item.id, item.quantity)
                    .await?;
                if !drawn.draws.is_empty() && !draws_recorded {
                    log.record(Compensation::RestoreCostDraws {
                        sale_id: sale.id.clone(),
                    });
                    draws_recorded = true;
                }
            }
        }

        if !sale.affects_credit() {
            return Ok(None);
        }
        let Some(customer_id) = sale.customer_id.as_deref() else {
            return Ok(None);
        };

        let customer = self
            .credit
            .charge_credit(shop_id, customer_id, sale.final_amount())
            .await?;
        log.record(Compensation::ReverseCredit {
            customer_id: customer_id.to_string(),
            delta: -sale.final_amount(),
        });

        Ok(Some(customer))
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels a completed sale, reversing its stock, cost layer and credit
    /// effects.
    ///
    /// ## Errors
    /// * `NotFound` - no such sale in the shop
    /// * `InvalidSaleStatus` - already cancelled, or being cancelled by
    ///   another request
    pub async fn cancel_sale(
        &self,
        shop_id: &str,
        sale_id: &str,
        actor_id: &str,
    ) -> LedgerResult<SaleDetail> {
        let sale = self.get_sale(shop_id, sale_id).await?;
        sale.ensure_cancellable()?;

        let claimed = self
            .db
            .sales()
            .transition_status(shop_id, sale_id, SaleStatus::Completed, SaleStatus::Cancelling)
            .await?;
        if !claimed {
            let current = self.get_sale(shop_id, sale_id).await?;
            warn!(
                sale_id = %sale_id,
                status = %current.status,
                "Sale changed before cancellation"
            );
            return Err(LedgerError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                status: current.status.to_string(),
            });
        }

        let mut log = CompensationLog::new();
        log.record(Compensation::RestoreSaleStatus {
            sale_id: sale_id.to_string(),
            from: SaleStatus::Cancelling,
            to: SaleStatus::Completed,
        });

        let reversed = match self.reverse_sale(&sale, actor_id, &mut log).await {
            Ok(()) => self
                .db
                .sales()
                .transition_status(shop_id, sale_id, SaleStatus::Cancelling, SaleStatus::Cancelled)
                .await
                .map_err(LedgerError::from),
            Err(err) => Err(err),
        };

        match reversed {
            Ok(true) => {}
            Ok(false) => {
                // Nothing else moves a sale out of `cancelling`.
                self.compensator().unwind(shop_id, actor_id, log).await;
                return Err(LedgerError::InvalidSaleStatus {
                    sale_id: sale_id.to_string(),
                    status: SaleStatus::Cancelling.to_string(),
                });
            }
            Err(err) => {
                warn!(sale_id = %sale_id, error = %err, "Cancellation failed, rolling back");
                self.compensator().unwind(shop_id, actor_id, log).await;
                return Err(err);
            }
        }

        info!(
            sale_id = %sale_id,
            sale_number = %sale.sale_number,
            shop_id = %shop_id,
            "Sale cancelled"
        );
        self.get_sale_by_id(shop_id, sale_id).await
    }

    async fn reverse_sale(
        &self,
        sale: &Sale,
        actor_id: &str,
        log: &mut CompensationLog,
    ) -> LedgerResult<()> {
        let shop_id = sale.shop_id.as_str();
        let items = self.db.sales().get_items(&sale.id).await?;

        let note = format!("Cancellation of sale {}", sale.sale_number);
        let rollback_note = format!("Cancellation of sale {} rolled back", sale.sale_number);

        for item in &items {
            self.stock
                .apply_stock_delta(
                    shop_id,
                    &item.product_id,
                    actor_id,
                    StockAction::Adjustment,
                    item.quantity,
                    Some(note.clone()),
                )
                .await?;
            log.record(Compensation::RestoreStock {
                product_id: item.product_id.clone(),
                delta: -item.quantity,
                note: rollback_note.clone(),
            });
        }

        // Draws exist only for sales made while FIFO consumption was on.
        let draws = self.db.cost_layers().draws_for_sale(&sale.id).await?;
        for draw in draws {
            self.layers.restore_draw(&draw).await?;
            log.record(Compensation::ReinstateDraw { draw });
        }

        if sale.affects_credit() {
            if let Some(customer_id) = sale.customer_id.as_deref() {
                self.credit
                    .apply_credit_delta(shop_id, customer_id, -sale.final_amount())
                    .await?;
                log.record(Compensation::ReverseCredit {
                    customer_id: customer_id.to_string(),
                    delta: sale.final_amount(),
                });
            }
        }

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A sale with its customer and items.
    pub async fn get_sale_by_id(&self, shop_id: &str, sale_id: &str) -> LedgerResult<SaleDetail> {
        let sale = self.get_sale(shop_id, sale_id).await?;

        let customer = match sale.customer_id.as_deref() {
            Some(customer_id) => self.db.customers().get_by_id(shop_id, customer_id).await?,
            None => None,
        };

        let items = self.db.sales().get_items(sale_id).await?;
        let mut products = HashMap::new();
        for item in &items {
            if products.contains_key(&item.product_id) {
                continue;
            }
            if let Some(product) = self.db.products().get_by_id(shop_id, &item.product_id).await? {
                products.insert(item.product_id.clone(), product);
            }
        }

        Ok(SaleDetail {
            items: item_details(items, &products),
            customer,
            sale,
        })
    }

    /// The shop's sales, newest first.
    pub async fn get_sales(&self, shop_id: &str, filter: &SaleFilter) -> LedgerResult<Vec<Sale>> {
        Ok(self.db.sales().list(shop_id, filter).await?)
    }

    async fn get_sale(&self, shop_id: &str, sale_id: &str) -> LedgerResult<Sale> {
        self.db
            .sales()
            .get_by_id(shop_id, sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))
    }

    fn compensator(&self) -> Compensator {
        Compensator::new(self.db.clone(), self.stock.clone())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn price_lines(input: &NewSale, products: &HashMap<String, Product>) -> LedgerResult<Vec<PricedLine>> {
    let mut lines = Vec::with_capacity(input.items.len());
    for item in &input.items {
        let product = products
            .get(&item.product_id)
            .ok_or_else(|| LedgerError::not_found("Product", &item.product_id))?;
        let unit_price = item
            .unit_price_cents
            .map(Money::from_cents)
            .unwrap_or_else(|| product.selling_price());

        lines.push(price_line(
            &product.id,
            item.quantity,
            unit_price,
            Money::from_cents(item.discount_amount_cents),
        )?);
    }
    Ok(lines)
}

fn sale_items(sale: &Sale, lines: &[PricedLine]) -> Vec<SaleItem> {
    lines
        .iter()
        .map(|line| SaleItem {
            id: new_id(),
            sale_id: sale.id.clone(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            discount_amount_cents: line.discount.cents(),
            total_price_cents: line.line_total.cents(),
            created_at: sale.created_at,
        })
        .collect()
}

fn item_details(items: Vec<SaleItem>, products: &HashMap<String, Product>) -> Vec<SaleItemDetail> {
    items
        .into_iter()
        .map(|item| SaleItemDetail {
            product: products.get(&item.product_id).map(ProductSummary::from),
            item,
        })
        .collect()
}

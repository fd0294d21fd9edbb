//! # Compensation Log
//!
//! The store has no transaction spanning several statements, so multi-step
//! operations keep a log of how to undo each step that succeeded. When a
//! later step fails the log is run backwards.
//!
//! ```text
//! forward                              log (undo)
//! ───────────────────────────────────  ─────────────────────────────
//! 1. insert sale                   ──► DeleteSale
//! 2. insert items                  ──► DeleteSaleItems
//! 3. stock -3 (product A)          ──► RestoreStock(A, +3)
//! 4. stock -2 (product B)  ✗ fails
//!
//! unwind: RestoreStock(A, +3) → DeleteSaleItems → DeleteSale
//! ```
//!
//! A failing undo step is logged and counted, and the unwind carries on
//! with the remaining steps.

use std::fmt;
use tracing::{error, info};

use crate::cost_layers::CostLayerAccountant;
use crate::credit::CreditLedger;
use crate::error::{LedgerError, LedgerResult};
use crate::stock::StockLedger;
use duka_core::{CostLayerDraw, Money, Product, SaleStatus, StockAction};
use duka_db::Database;

/// How to undo one forward step.
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    DeleteSale { sale_id: String },
    DeleteSaleItems { sale_id: String },
    /// Applied as an `adjustment` movement carrying `note`.
    RestoreStock {
        product_id: String,
        delta: i64,
        note: String,
    },
    RestoreCostDraws { sale_id: String },
    /// Takes one draw a cancellation restored out of its layer again.
    ReinstateDraw { draw: CostLayerDraw },
    ReverseCredit { customer_id: String, delta: Money },
    RestoreSaleStatus {
        sale_id: String,
        from: SaleStatus,
        to: SaleStatus,
    },
    DeleteCostLayer { layer_id: String },
    RestoreCostPrice {
        product_id: String,
        cost_price_cents: i64,
    },
    DeactivateProduct { product_id: String },
    /// Writes back the descriptive fields and prices of an edited product.
    RestoreProductDetails { previous: Box<Product> },
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::DeleteSale { sale_id } => write!(f, "delete sale {sale_id}"),
            Compensation::DeleteSaleItems { sale_id } => write!(f, "delete items of sale {sale_id}"),
            Compensation::RestoreStock { product_id, delta, .. } => {
                write!(f, "restore stock of {product_id} by {delta}")
            }
            Compensation::RestoreCostDraws { sale_id } => {
                write!(f, "restore cost layer draws of sale {sale_id}")
            }
            Compensation::ReinstateDraw { draw } => {
                write!(f, "redraw {} units from layer {}", draw.quantity, draw.layer_id)
            }
            Compensation::ReverseCredit { customer_id, delta } => {
                write!(f, "move credit of {customer_id} by {delta}")
            }
            Compensation::RestoreSaleStatus { sale_id, from, to } => {
                write!(f, "move sale {sale_id} from {from} back to {to}")
            }
            Compensation::DeleteCostLayer { layer_id } => write!(f, "delete cost layer {layer_id}"),
            Compensation::RestoreCostPrice { product_id, cost_price_cents } => {
                write!(f, "restore cost price of {product_id} to {}", Money::from_cents(*cost_price_cents))
            }
            Compensation::DeactivateProduct { product_id } => write!(f, "deactivate product {product_id}"),
            Compensation::RestoreProductDetails { previous } => {
                write!(f, "restore details of product {}", previous.id)
            }
        }
    }
}

/// Undo steps in the order their forward steps ran.
#[derive(Debug, Default)]
pub struct CompensationLog {
    steps: Vec<Compensation>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Compensation] {
        &self.steps
    }

    /// Steps in undo order (last recorded first).
    pub fn into_unwind_order(self) -> impl Iterator<Item = Compensation> {
        self.steps.into_iter().rev()
    }
}

/// Runs a [`CompensationLog`] backwards for one shop and actor.
#[derive(Debug, Clone)]
pub struct Compensator {
    db: Database,
    stock: StockLedger,
    layers: CostLayerAccountant,
    credit: CreditLedger,
}

impl Compensator {
    pub fn new(db: Database, stock: StockLedger) -> Self {
        Compensator {
            layers: CostLayerAccountant::new(db.clone()),
            credit: CreditLedger::new(db.clone()),
            db,
            stock,
        }
    }

    /// Undoes every step, newest first. Returns how many steps failed.
    pub async fn unwind(&self, shop_id: &str, actor_id: &str, log: CompensationLog) -> usize {
        if log.is_empty() {
            return 0;
        }

        let total = log.len();
        let mut unresolved = 0;

        for step in log.into_unwind_order() {
            if let Err(err) = self.run(shop_id, actor_id, &step).await {
                unresolved += 1;
                error!(shop_id = %shop_id, step = %step, error = %err, "Compensation step failed");
            }
        }

        info!(shop_id = %shop_id, steps = total, unresolved, "Compensation log unwound");
        unresolved
    }

    async fn run(&self, shop_id: &str, actor_id: &str, step: &Compensation) -> LedgerResult<()> {
        match step {
            Compensation::DeleteSale { sale_id } => {
                self.db.sales().delete_sale(shop_id, sale_id).await?;
            }
            Compensation::DeleteSaleItems { sale_id } => {
                self.db.sales().delete_items(sale_id).await?;
            }
            Compensation::RestoreStock {
                product_id,
                delta,
                note,
            } => {
                self.stock
                    .apply_stock_delta(
                        shop_id,
                        product_id,
                        actor_id,
                        StockAction::Adjustment,
                        *delta,
                        Some(note.clone()),
                    )
                    .await?;
            }
            Compensation::RestoreCostDraws { sale_id } => {
                self.layers.restore_draws(sale_id).await?;
            }
            Compensation::ReinstateDraw { draw } => {
                self.layers.reinstate_draw(draw).await?;
            }
            Compensation::ReverseCredit { customer_id, delta } => {
                self.credit
                    .apply_credit_delta(shop_id, customer_id, *delta)
                    .await?;
            }
            Compensation::RestoreSaleStatus { sale_id, from, to } => {
                let moved = self
                    .db
                    .sales()
                    .transition_status(shop_id, sale_id, *from, *to)
                    .await?;
                if !moved {
                    return Err(LedgerError::InvalidSaleStatus {
                        sale_id: sale_id.clone(),
                        status: format!("no longer {from}"),
                    });
                }
            }
            Compensation::DeleteCostLayer { layer_id } => {
                self.db.cost_layers().delete(shop_id, layer_id).await?;
            }
            Compensation::RestoreCostPrice {
                product_id,
                cost_price_cents,
            } => {
                self.db
                    .products()
                    .set_cost_price(shop_id, product_id, *cost_price_cents)
                    .await?;
            }
            Compensation::DeactivateProduct { product_id } => {
                self.db.products().soft_delete(shop_id, product_id).await?;
            }
            Compensation::RestoreProductDetails { previous } => {
                self.db.products().update_details(previous).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwind_order_is_reversed() {
        let mut log = CompensationLog::new();
        assert!(log.is_empty());

        log.record(Compensation::DeleteSale {
            sale_id: "s-1".into(),
        });
        log.record(Compensation::DeleteSaleItems {
            sale_id: "s-1".into(),
        });
        log.record(Compensation::RestoreStock {
            product_id: "p-1".into(),
            delta: 3,
            note: "Rollback of sale S-20261019-000001".into(),
        });
        assert_eq!(log.len(), 3);

        let order: Vec<Compensation> = log.into_unwind_order().collect();
        assert!(matches!(order[0], Compensation::RestoreStock { delta: 3, .. }));
        assert!(matches!(order[1], Compensation::DeleteSaleItems { .. }));
        assert!(matches!(order[2], Compensation::DeleteSale { .. }));
    }

    #[test]
    fn test_step_descriptions() {
        let step = Compensation::ReverseCredit {
            customer_id: "c-1".into(),
            delta: Money::from_cents(-5_000),
        };
        assert_eq!(step.to_string(), "move credit of c-1 by -50.00");

        let step = Compensation::RestoreSaleStatus {
            sale_id: "s-1".into(),
            from: SaleStatus::Cancelling,
            to: SaleStatus::Completed,
        };
        assert_eq!(step.to_string(), "move sale s-1 from cancelling back to completed");
    }
}

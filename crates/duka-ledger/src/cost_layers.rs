//! # Cost-Layer Accountant
//!
//! Each receipt of stock opens a cost layer at the price actually paid.
//! Layers are never averaged together.
//!
//! Drawing layers on sale is off by default (`DUKA_CONSUME_COST_LAYERS`).
//! When it is on, a sale line takes units from the oldest open layers first
//! and records a draw per layer so a cancellation can put them back.
//!
//! ```text
//! sell 12                 L1 10 @ 1.80 ──► 0    draw 10 @ 1.80 = 18.00
//!                         L2  5 @ 2.00 ──► 3    draw  2 @ 2.00 =  4.00
//!                                               cost of sale    = 22.00
//! ```

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::LedgerResult;
use duka_core::{new_id, CostLayer, CostLayerDraw, CostLayerSource, Money};
use duka_db::{Database, DbError};

/// Outcome of a FIFO draw for one sale line.
#[derive(Debug, Clone, PartialEq)]
pub struct FifoDraw {
    pub draws: Vec<CostLayerDraw>,
    /// Units no open layer could cover.
    pub uncosted: i64,
}

impl FifoDraw {
    pub fn cost(&self) -> Money {
        CostLayerAccountant::cost_of_draws(&self.draws)
    }
}

#[derive(Debug, Clone)]
pub struct CostLayerAccountant {
    db: Database,
}

impl CostLayerAccountant {
    pub fn new(db: Database) -> Self {
        CostLayerAccountant { db }
    }

    /// Opens a layer of `quantity` units at `unit_cost`.
    ///
    /// Returns `None` without writing anything when `quantity` is not
    /// positive.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_cost_layer(
        &self,
        shop_id: &str,
        product_id: &str,
        actor_id: &str,
        quantity: i64,
        unit_cost: Money,
        source_type: CostLayerSource,
        source_id: &str,
    ) -> LedgerResult<Option<CostLayer>> {
        if quantity <= 0 {
            return Ok(None);
        }

        let layer = self
            .db
            .cost_layers()
            .insert(&CostLayer {
                id: new_id(),
                shop_id: shop_id.to_string(),
                product_id: product_id.to_string(),
                source_type,
                source_id: source_id.to_string(),
                unit_cost_cents: unit_cost.cents(),
                initial_quantity: quantity,
                remaining_quantity: quantity,
                actor_id: actor_id.to_string(),
                created_at: Utc::now(),
            })
            .await?;

        debug!(
            layer_id = %layer.id,
            product_id = %product_id,
            quantity,
            %unit_cost,
            "Cost layer opened"
        );
        Ok(Some(layer))
    }

    /// A product's layers, oldest first.
    pub async fn list_layers(
        &self,
        shop_id: &str,
        product_id: &str,
        only_open: bool,
    ) -> LedgerResult<Vec<CostLayer>> {
        Ok(self
            .db
            .cost_layers()
            .list(shop_id, product_id, only_open)
            .await?)
    }

    /// Takes `quantity` units from the product's open layers, oldest first.
    ///
    /// A layer drawn by a concurrent sale between the listing and the
    /// decrement is skipped and the listing retried. Units left over once no
    /// open layer remains are reported as `uncosted`, not as an error.
    ///
    /// On a store error the draws already made by this call are undone.
    pub async fn draw_fifo(
        &self,
        shop_id: &str,
        product_id: &str,
        sale_id: &str,
        sale_item_id: &str,
        quantity: i64,
    ) -> LedgerResult<FifoDraw> {
        let mut draws = Vec::new();
        let mut remaining = quantity;

        while remaining > 0 {
            let layers = self.list_layers(shop_id, product_id, true).await?;
            let mut progressed = false;

            for layer in layers {
                let take = remaining.min(layer.remaining_quantity);
                match self.take_from(&layer, take, shop_id, sale_id, sale_item_id).await {
                    Ok(Some(draw)) => {
                        remaining -= draw.quantity;
                        draws.push(draw);
                        progressed = true;
                    }
                    Ok(None) => continue,
                    Err(err) => {
                        self.undo(&draws).await;
                        return Err(err);
                    }
                }
                if remaining == 0 {
                    break;
                }
            }

            if !progressed {
                break;
            }
        }

        if remaining > 0 {
            warn!(
                product_id = %product_id,
                sale_id = %sale_id,
                uncosted = remaining,
                "Not enough open cost layers to cost the sale"
            );
        }

        Ok(FifoDraw {
            draws,
            uncosted: remaining,
        })
    }

    /// Puts every draw of a sale back on its layer.
    ///
    /// Each restored draw is removed, so calling this again only handles
    /// what a failed earlier call left behind.
    pub async fn restore_draws(&self, sale_id: &str) -> LedgerResult<Vec<CostLayerDraw>> {
        let draws = self.db.cost_layers().draws_for_sale(sale_id).await?;

        for draw in &draws {
            self.restore_draw(draw).await?;
        }

        if !draws.is_empty() {
            info!(sale_id = %sale_id, restored = draws.len(), "Cost layer draws restored");
        }
        Ok(draws)
    }

    /// Removes one draw row and puts its units back on the layer.
    ///
    /// The row goes first: a draw row always means the units are still out
    /// of the layer. If the layer update then fails the row is put back.
    pub async fn restore_draw(&self, draw: &CostLayerDraw) -> LedgerResult<()> {
        let layers = self.db.cost_layers();
        layers.delete_draw(&draw.id).await?;

        if let Err(err) = layers.restore(&draw.layer_id, draw.quantity).await {
            if let Err(reinsert_err) = layers.insert_draw(draw).await {
                error!(
                    draw_id = %draw.id,
                    layer_id = %draw.layer_id,
                    error = %reinsert_err,
                    "Could not put back draw row after failed restore"
                );
            }
            return Err(err.into());
        }

        Ok(())
    }

    /// Takes a restored draw out of its layer again and records it under
    /// its original id.
    pub async fn reinstate_draw(&self, draw: &CostLayerDraw) -> LedgerResult<()> {
        let layers = self.db.cost_layers();
        if layers.consume(&draw.layer_id, draw.quantity).await?.is_none() {
            return Err(DbError::QueryFailed(format!(
                "cost layer {} no longer holds {} units",
                draw.layer_id, draw.quantity
            ))
            .into());
        }

        if let Err(err) = layers.insert_draw(draw).await {
            if let Err(restore_err) = layers.restore(&draw.layer_id, draw.quantity).await {
                error!(
                    layer_id = %draw.layer_id,
                    quantity = draw.quantity,
                    error = %restore_err,
                    "Could not put units back on layer"
                );
            }
            return Err(err.into());
        }

        Ok(())
    }

    pub fn cost_of_draws(draws: &[CostLayerDraw]) -> Money {
        draws.iter().map(CostLayerDraw::cost).sum()
    }

    /// One conditional decrement plus its draw row.
    ///
    /// `None` when the layer no longer holds `take` units.
    async fn take_from(
        &self,
        layer: &CostLayer,
        take: i64,
        shop_id: &str,
        sale_id: &str,
        sale_item_id: &str,
    ) -> LedgerResult<Option<CostLayerDraw>> {
        let layers = self.db.cost_layers();
        if layers.consume(&layer.id, take).await?.is_none() {
            debug!(layer_id = %layer.id, take, "Layer drawn concurrently, skipping");
            return Ok(None);
        }

        let draw = CostLayerDraw {
            id: new_id(),
            shop_id: shop_id.to_string(),
            sale_id: sale_id.to_string(),
            sale_item_id: sale_item_id.to_string(),
            layer_id: layer.id.clone(),
            quantity: take,
            unit_cost_cents: layer.unit_cost_cents,
            created_at: Utc::now(),
        };

        if let Err(err) = layers.insert_draw(&draw).await {
            if let Err(restore_err) = layers.restore(&layer.id, take).await {
                error!(
                    layer_id = %layer.id,
                    take,
                    error = %restore_err,
                    "Could not put units back on layer"
                );
            }
            return Err(err.into());
        }

        Ok(Some(draw))
    }

    async fn undo(&self, draws: &[CostLayerDraw]) {
        let layers = self.db.cost_layers();
        for draw in draws {
            let result = match layers.restore(&draw.layer_id, draw.quantity).await {
                Ok(()) => layers.delete_draw(&draw.id).await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                error!(
                    draw_id = %draw.id,
                    layer_id = %draw.layer_id,
                    error = %err,
                    "Could not undo cost layer draw"
                );
            }
        }
    }
}

//! # Sale Pricing
//!
//! Line and sale totals, computed before anything is written.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  For each line:                                                         │
//! │    gross      = unit_price × quantity                                   │
//! │    line_total = gross − line_discount        (line_discount ≤ gross)    │
//! │                                                                         │
//! │  For the sale:                                                          │
//! │    total_amount = Σ line_total                                          │
//! │    final_amount = total_amount − sale_discount + tax                    │
//! │                                        (sale_discount ≤ total_amount)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All arithmetic is checked; an overflow is a validation failure, never a
//! wrapped total.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::money::Money;

fn overflow(field: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "amount out of range".to_string(),
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// A priced sale line, ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
    pub line_total: Money,
}

/// Prices one line.
///
/// Fails when the discount exceeds the gross amount or the gross amount
/// overflows.
pub fn price_line(
    product_id: &str,
    quantity: i64,
    unit_price: Money,
    discount: Money,
) -> Result<PricedLine, ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }
    if unit_price.is_negative() {
        return Err(ValidationError::must_not_be_negative("unit_price"));
    }
    if discount.is_negative() {
        return Err(ValidationError::must_not_be_negative("discount_amount"));
    }

    let gross = unit_price
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| overflow("unit_price"))?;

    if discount > gross {
        return Err(ValidationError::ExceedsLimit {
            field: "discount_amount".to_string(),
            amount: discount,
            limit: gross,
        });
    }

    Ok(PricedLine {
        product_id: product_id.to_string(),
        quantity,
        unit_price,
        discount,
        line_total: gross - discount,
    })
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Totals stored on the sale row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub total: Money,
    pub discount: Money,
    pub tax: Money,
    pub final_amount: Money,
}

impl SaleTotals {
    /// Sums the lines and applies the sale-level discount and tax.
    pub fn compute(
        lines: &[PricedLine],
        discount: Money,
        tax: Money,
    ) -> Result<SaleTotals, ValidationError> {
        if discount.is_negative() {
            return Err(ValidationError::must_not_be_negative("discount_amount"));
        }
        if tax.is_negative() {
            return Err(ValidationError::must_not_be_negative("tax_amount"));
        }

        let mut total = Money::zero();
        for line in lines {
            total = total
                .checked_add(line.line_total)
                .ok_or_else(|| overflow("total_amount"))?;
        }

        if discount > total {
            return Err(ValidationError::ExceedsLimit {
                field: "discount_amount".to_string(),
                amount: discount,
                limit: total,
            });
        }

        let final_amount = (total - discount)
            .checked_add(tax)
            .ok_or_else(|| overflow("final_amount"))?;

        Ok(SaleTotals {
            total,
            discount,
            tax,
            final_amount,
        })
    }
}

// =============================================================================
// Stock Demand
// =============================================================================

/// Total quantity requested per product.
///
/// A product listed on two lines must have stock for both.
pub fn requested_quantities(lines: &[PricedLine]) -> BTreeMap<&str, i64> {
    let mut demand: BTreeMap<&str, i64> = BTreeMap::new();
    for line in lines {
        *demand.entry(line.product_id.as_str()).or_insert(0) += line.quantity;
    }
    demand
}

// =============================================================================
// Unit Tests
// =============================================================================

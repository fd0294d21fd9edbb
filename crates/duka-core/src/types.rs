//! # Domain Types
//!
//! Entities the ledger engine reads and writes, plus the input shapes its
//! operations accept.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Entities                                 │
//! │                                                                         │
//! │  ┌─────────────┐ 1    * ┌───────────────┐      ┌────────────────┐      │
//! │  │   Product   │────────│ StockMovement │      │    Customer    │      │
//! │  │ stock_qty≥0 │        │ append-only   │      │ credit_balance │      │
//! │  └──────┬──────┘        └───────────────┘      └───────┬────────┘      │
//! │         │ 1                                            │ 0..1          │
//! │         │     * ┌───────────────┐                      │               │
//! │         ├───────│   CostLayer   │◄──┐          ┌───────┴────────┐      │
//! │         │       │ FIFO lot      │   │          │      Sale      │      │
//! │         │       └───────────────┘   │ *        │ completed →    │      │
//! │         │                   ┌───────┴───────┐  │ cancelled      │      │
//! │         │                   │ CostLayerDraw │  └───────┬────────┘      │
//! │         │                   └───────────────┘          │ 1..*          │
//! │         │ 1                                    ┌───────┴────────┐      │
//! │         └──────────────────────────────────────│    SaleItem    │      │
//! │                                                └────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries a `shop_id`; all lookups are scoped by it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Generates a new entity ID (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Category
// =============================================================================

/// A product grouping, unique by name within a shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
///
/// `stock_quantity` is only ever changed through the stock ledger, so every
/// change has a matching [`StockMovement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub shop_id: String,
    pub category_id: Option<String>,
    pub name: String,
    /// Unique among the shop's active products.
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub unit: String,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    pub stock_quantity: i64,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    /// Soft-delete flag; products are never physically removed.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// At or below the reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_level
    }

    /// Checks that `requested` units can be taken from stock.
    pub fn ensure_available(&self, requested: i64) -> CoreResult<()> {
        if self.stock_quantity < requested {
            return Err(CoreError::InsufficientStock {
                product_id: self.id.clone(),
                available: self.stock_quantity,
                requested,
            });
        }
        Ok(())
    }
}

/// The product fields shown next to a sale line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub unit: String,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        ProductSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            barcode: p.barcode.clone(),
            sku: p.sku.clone(),
            unit: p.unit.clone(),
        }
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a product's stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    /// Goods received (including a product's initial stock).
    Purchase,
    /// Goods sold.
    Sale,
    /// Manual correction, cancellation or rollback.
    Adjustment,
}

impl StockAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockAction::Purchase => "purchase",
            StockAction::Sale => "sale",
            StockAction::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for StockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one stock quantity change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub shop_id: String,
    pub product_id: String,
    pub action: StockAction,
    /// Magnitude of the change (always positive).
    pub quantity: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub notes: Option<String>,
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Builds the movement for a change from `previous` to `new`.
    pub fn record(
        shop_id: &str,
        product_id: &str,
        actor_id: &str,
        action: StockAction,
        previous: i64,
        new: i64,
        notes: Option<String>,
    ) -> Self {
        StockMovement {
            id: new_id(),
            shop_id: shop_id.to_string(),
            product_id: product_id.to_string(),
            action,
            quantity: (new - previous).abs(),
            previous_quantity: previous,
            new_quantity: new,
            notes,
            actor_id: actor_id.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Signed change this movement applied.
    #[inline]
    pub fn delta(&self) -> i64 {
        self.new_quantity - self.previous_quantity
    }
}

// =============================================================================
// Cost Layers
// =============================================================================

/// Where a cost layer's units came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CostLayerSource {
    /// Stock entered when the product was created.
    InitialStock,
    /// A later stock receipt.
    Purchase,
}

/// A FIFO lot: units received together at one unit cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CostLayer {
    pub id: String,
    pub shop_id: String,
    pub product_id: String,
    pub source_type: CostLayerSource,
    pub source_id: String,
    pub unit_cost_cents: i64,
    pub initial_quantity: i64,
    /// `0 <= remaining_quantity <= initial_quantity`
    pub remaining_quantity: i64,
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CostLayer {
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// Still has units to draw from.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.remaining_quantity > 0
    }

    /// Value of the units still in this lot.
    pub fn remaining_value(&self) -> Money {
        self.unit_cost().multiply_quantity(self.remaining_quantity)
    }
}

/// Units of one sale line costed from one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CostLayerDraw {
    pub id: String,
    pub shop_id: String,
    pub sale_id: String,
    pub sale_item_id: String,
    pub layer_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CostLayerDraw {
    /// Cost of the drawn units.
    pub fn cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A shop customer who may buy on credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Amount the customer owes the shop.
    pub credit_balance_cents: i64,
    /// `None` means no limit is enforced.
    pub credit_limit_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn credit_balance(&self) -> Money {
        Money::from_cents(self.credit_balance_cents)
    }

    #[inline]
    pub fn credit_limit(&self) -> Option<Money> {
        self.credit_limit_cents.map(Money::from_cents)
    }

    /// Checks that `amount` more credit stays within the limit.
    pub fn ensure_credit_available(&self, amount: Money) -> CoreResult<()> {
        let Some(limit) = self.credit_limit() else {
            return Ok(());
        };
        let attempted = self.credit_balance() + amount;
        if attempted > limit {
            return Err(CoreError::CreditLimitExceeded {
                customer_id: self.id.clone(),
                limit,
                attempted,
            });
        }
        Ok(())
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// ```text
/// completed ──► cancelling ──► cancelled
///     ▲              │
///     └──────────────┘  (only when a cancellation is rolled back)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is paid and its stock and credit effects are applied.
    Completed,
    /// A cancellation is reversing the sale's effects.
    Cancelling,
    /// Effects reversed. Terminal.
    Cancelled,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelling => "cancelling",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    BankTransfer,
    Card,
    /// Customer owes the amount; tracked on their credit balance.
    Credit,
}

impl PaymentMethod {
    #[inline]
    pub const fn is_credit(&self) -> bool {
        matches!(self, PaymentMethod::Credit)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale and its totals.
///
/// `final_amount = total_amount - discount_amount + tax_amount`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub shop_id: String,
    pub customer_id: Option<String>,
    /// Per-shop unique number printed on receipts.
    pub sale_number: String,
    pub total_amount_cents: i64,
    pub discount_amount_cents: i64,
    pub tax_amount_cents: i64,
    pub final_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn final_amount(&self) -> Money {
        Money::from_cents(self.final_amount_cents)
    }

    /// Whether this sale moved the customer's credit balance.
    pub fn affects_credit(&self) -> bool {
        self.payment_method.is_credit() && self.customer_id.is_some()
    }

    /// Only completed sales can be cancelled.
    pub fn ensure_cancellable(&self) -> CoreResult<()> {
        if self.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

/// Formats a sale number: `S-YYYYMMDD-NNNNNN`.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use duka_core::format_sale_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
/// assert_eq!(format_sale_number(at, 42), "S-20261019-000042");
/// ```
pub fn format_sale_number(at: DateTime<Utc>, sequence: i64) -> String {
    format!("S-{}-{:06}", at.format("%Y%m%d"), sequence)
}

// =============================================================================
// Sale Item
// =============================================================================

/// A sale line. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_amount_cents: i64,
    /// `unit_price * quantity - discount_amount`
    pub total_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sale line joined with its product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemDetail {
    pub item: SaleItem,
    /// `None` only if the product row has disappeared.
    pub product: Option<ProductSummary>,
}

/// A sale composed with its customer and lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub customer: Option<Customer>,
    pub items: Vec<SaleItemDetail>,
}

// =============================================================================
// Inputs
// =============================================================================

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct NewProduct {
    pub name: String,
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub category_id: Option<String>,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    /// Initial stock; recorded as a cost layer and a purchase movement.
    pub stock_quantity: i64,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
}

/// Partial product update. `None` leaves a field unchanged.
///
/// For `barcode`, `sku` and `category_id` an empty string clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub category_id: Option<String>,
    pub cost_price_cents: Option<i64>,
    pub selling_price_cents: Option<i64>,
    /// When different from the current level, recorded as an adjustment.
    pub stock_quantity: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub max_stock_level: Option<i64>,
}

/// Input for receiving goods into stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct StockReceipt {
    pub quantity: i64,
    /// Falls back to the product's current cost price.
    pub unit_cost_cents: Option<i64>,
    /// Purchase order / supplier invoice the goods arrived on.
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// Input for creating a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit_cents: Option<i64>,
}

/// One requested sale line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
    /// Price override; defaults to the product's selling price.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
    #[serde(default)]
    pub discount_amount_cents: i64,
}

impl NewSaleItem {
    /// A line at the product's selling price with no discount.
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        NewSaleItem {
            product_id: product_id.into(),
            quantity,
            unit_price_cents: None,
            discount_amount_cents: 0,
        }
    }
}

/// Input for creating a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<NewSaleItem>,
    #[serde(default)]
    pub discount_amount_cents: i64,
    #[serde(default)]
    pub tax_amount_cents: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewSale {
    /// A sale of `items` with no customer, discount or tax.
    pub fn new(payment_method: PaymentMethod, items: Vec<NewSaleItem>) -> Self {
        NewSale {
            customer_id: None,
            items,
            discount_amount_cents: 0,
            tax_amount_cents: 0,
            payment_method,
            notes: None,
        }
    }
}

/// Result of a duplicate check before creating a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DuplicateCheck {
    /// Active product with exactly this barcode.
    pub barcode_match: Option<Product>,
    /// Active products with a similar name.
    pub similar_names: Vec<Product>,
}

impl DuplicateCheck {
    pub fn is_empty(&self) -> bool {
        self.barcode_match.is_none() && self.similar_names.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            shop_id: "shop-1".to_string(),
            category_id: None,
            name: "Sugar 1kg".to_string(),
            barcode: Some("6001234".to_string()),
            sku: None,
            unit: "pcs".to_string(),
            cost_price_cents: 180,
            selling_price_cents: 250,
            stock_quantity: stock,
            min_stock_level: 5,
            max_stock_level: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ensure_available() {
        let p = product(2);
        assert!(p.ensure_available(2).is_ok());
        let err = p.ensure_available(3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 2, requested: 3, .. }
        ));
    }

    #[test]
    fn test_low_stock() {
        assert!(product(5).is_low_stock());
        assert!(!product(6).is_low_stock());
    }

    #[test]
    fn test_movement_delta() {
        let down = StockMovement::record("s", "p", "u", StockAction::Sale, 10, 7, None);
        assert_eq!(down.quantity, 3);
        assert_eq!(down.delta(), -3);

        let up = StockMovement::record("s", "p", "u", StockAction::Purchase, 10, 15, None);
        assert_eq!(up.quantity, 5);
        assert_eq!(up.delta(), 5);
    }

    #[test]
    fn test_credit_limit() {
        let now = Utc::now();
        let mut customer = Customer {
            id: "c-1".to_string(),
            shop_id: "shop-1".to_string(),
            name: "Amina".to_string(),
            phone: None,
            email: None,
            address: None,
            credit_balance_cents: 4_000,
            credit_limit_cents: Some(5_000),
            created_at: now,
            updated_at: now,
        };

        assert!(customer.ensure_credit_available(Money::from_cents(1_000)).is_ok());
        assert!(matches!(
            customer.ensure_credit_available(Money::from_cents(1_001)),
            Err(CoreError::CreditLimitExceeded { .. })
        ));

        customer.credit_limit_cents = None;
        assert!(customer.ensure_credit_available(Money::from_cents(1_000_000)).is_ok());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::MobileMoney).unwrap(),
            "\"mobile_money\""
        );
        assert_eq!(
            serde_json::to_string(&CostLayerSource::InitialStock).unwrap(),
            "\"initial_stock\""
        );
        assert_eq!(StockAction::Adjustment.to_string(), "adjustment");
        assert_eq!(SaleStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_new_sale_defaults_from_json() {
        let sale: NewSale = serde_json::from_str(
            r#"{"items":[{"product_id":"p-1","quantity":2}],"payment_method":"cash"}"#,
        )
        .unwrap();
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].discount_amount_cents, 0);
        assert!(sale.items[0].unit_price_cents.is_none());
        assert_eq!(sale.tax_amount_cents, 0);
        assert!(sale.customer_id.is_none());
    }
}

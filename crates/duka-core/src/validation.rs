//! # Validation Module
//!
//! Input validation for the ledger engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request handler (out of scope)                               │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rule validation, before any store write                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock_quantity >= 0)                                       │
//! │  ├── UNIQUE active barcode per shop                                    │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use duka_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("SUGAR-1KG").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{NewCategory, NewCustomer, NewProduct, NewSale, ProductUpdate};
use crate::{MAX_ITEM_QUANTITY, MAX_NOTES_LEN, MAX_SALE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_SKU_LEN: usize = 50;
const MAX_BARCODE_LEN: usize = 64;
const MAX_UNIT_LEN: usize = 20;

// =============================================================================
// String Validators
// =============================================================================

fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ```rust
/// use duka_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Sugar 1kg").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, MAX_NAME_LEN)
}

/// Validates a customer name. Same rules as product names.
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, MAX_NAME_LEN)
}

/// Validates a category name. Same rules as product names.
pub fn validate_category_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, MAX_NAME_LEN)
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ```rust
/// use duka_core::validation::validate_sku;
///
/// assert!(validate_sku("SUGAR-1KG").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_required_text("sku", sku, MAX_SKU_LEN)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a barcode. Barcodes are compared exactly, so no
/// whitespace is allowed inside one.
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    validate_required_text("barcode", barcode, MAX_BARCODE_LEN)?;

    if barcode.trim().chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit of measure ("pcs", "kg", ...).
pub fn validate_unit(unit: &str) -> ValidationResult<()> {
    validate_required_text("unit", unit, MAX_UNIT_LEN)
}

/// Validates free-text notes.
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        });
    }
    Ok(())
}

/// Trims a value, mapping empty results to `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale line or receipt quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Till: add 5 × SUGAR-1KG                                                │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0?       → "quantity must be positive"                │
/// │       ├── qty > 100000?   → "quantity must be between 1 and 100000"    │
/// │       └── OK → priced into the sale                                    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount or level (prices, stock, discounts).
///
/// ```rust
/// use duka_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("cost_price", 0).is_ok());
/// assert!(validate_non_negative("cost_price", -1).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::must_not_be_negative(field));
    }
    Ok(())
}

/// Validates reorder levels: both non-negative, max not below min.
pub fn validate_stock_levels(min: i64, max: Option<i64>) -> ValidationResult<()> {
    validate_non_negative("min_stock_level", min)?;

    if let Some(max) = max {
        if max < min {
            return Err(ValidationError::OutOfRange {
                field: "max_stock_level".to_string(),
                min,
                max: i64::MAX,
            });
        }
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use duka_core::validation::validate_uuid;
///
/// assert!(validate_uuid("customer_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("customer_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Input Validators
// =============================================================================

/// Validates everything in a [`NewProduct`] that needs no store lookup.
pub fn validate_new_product(input: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&input.name)?;

    if let Some(barcode) = normalize_optional(input.barcode.as_deref()) {
        validate_barcode(&barcode)?;
    }
    if let Some(sku) = normalize_optional(input.sku.as_deref()) {
        validate_sku(&sku)?;
    }
    if let Some(unit) = normalize_optional(input.unit.as_deref()) {
        validate_unit(&unit)?;
    }

    validate_non_negative("cost_price", input.cost_price_cents)?;
    validate_non_negative("selling_price", input.selling_price_cents)?;
    validate_non_negative("stock_quantity", input.stock_quantity)?;
    validate_stock_levels(input.min_stock_level, input.max_stock_level)?;

    Ok(())
}

/// Validates the fields present in a [`ProductUpdate`].
///
/// Empty `barcode`/`sku` strings are allowed: they clear the value.
pub fn validate_product_update(update: &ProductUpdate) -> ValidationResult<()> {
    if let Some(name) = &update.name {
        validate_product_name(name)?;
    }
    if let Some(barcode) = normalize_optional(update.barcode.as_deref()) {
        validate_barcode(&barcode)?;
    }
    if let Some(sku) = normalize_optional(update.sku.as_deref()) {
        validate_sku(&sku)?;
    }
    if let Some(unit) = &update.unit {
        validate_unit(unit)?;
    }
    if let Some(cost) = update.cost_price_cents {
        validate_non_negative("cost_price", cost)?;
    }
    if let Some(price) = update.selling_price_cents {
        validate_non_negative("selling_price", price)?;
    }
    if let Some(stock) = update.stock_quantity {
        validate_non_negative("stock_quantity", stock)?;
    }
    if let Some(min) = update.min_stock_level {
        validate_non_negative("min_stock_level", min)?;
    }
    if let Some(max) = update.max_stock_level {
        validate_non_negative("max_stock_level", max)?;
    }

    Ok(())
}

/// Validates a sale request's shape. Pricing and stock checks happen later,
/// once products are loaded.
pub fn validate_new_sale(input: &NewSale) -> ValidationResult<()> {
    if input.items.is_empty() {
        return Err(ValidationError::required("items"));
    }

    if input.items.len() > MAX_SALE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_ITEMS as i64,
        });
    }

    for item in &input.items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        validate_quantity(item.quantity)?;
        validate_non_negative("discount_amount", item.discount_amount_cents)?;
        if let Some(price) = item.unit_price_cents {
            validate_non_negative("unit_price", price)?;
        }
    }

    validate_non_negative("discount_amount", input.discount_amount_cents)?;
    validate_non_negative("tax_amount", input.tax_amount_cents)?;

    if let Some(notes) = &input.notes {
        validate_notes(notes)?;
    }

    Ok(())
}

pub fn validate_new_customer(input: &NewCustomer) -> ValidationResult<()> {
    validate_customer_name(&input.name)?;
    if let Some(limit) = input.credit_limit_cents {
        validate_non_negative("credit_limit", limit)?;
    }
    Ok(())
}

pub fn validate_new_category(input: &NewCategory) -> ValidationResult<()> {
    validate_category_name(&input.name)?;
    if let Some(description) = &input.description {
        validate_notes(description)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Error Types
//!
//! Domain-specific error types for duka-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  duka-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  duka-db errors                                                        │
//! │  └── DbError          - Store operation failures                       │
//! │                                                                         │
//! │  duka-ledger errors                                                    │
//! │  └── LedgerError      - What callers of the engine see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations detected without touching the store.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Selling more than the product has on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line: 3 × SUGAR-1KG
    ///      │
    ///      ▼
    /// Check stock: available = 2
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// UI shows: "Only 2 in stock"
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Cancelling a sale that is already cancelled
    /// - Cancelling a sale another request is cancelling right now
    #[error("Sale {sale_id} is {status}, cannot perform operation")]
    InvalidSaleStatus { sale_id: String, status: String },

    /// A credit sale would push the customer past their limit.
    #[error("Credit limit exceeded for customer {customer_id}: limit {limit}, balance would be {attempted}")]
    CreditLimitExceeded {
        customer_id: String,
        limit: Money,
        attempted: Money,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store write happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., category name).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// An amount larger than what it applies to (a discount above the line
    /// gross, a repayment above the balance owed).
    #[error("{field} of {amount} exceeds {limit}")]
    ExceedsLimit {
        field: String,
        amount: Money,
        limit: Money,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::MustBePositive`].
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::MustNotBeNegative`].
    pub fn must_not_be_negative(field: impl Into<String>) -> Self {
        ValidationError::MustNotBeNegative {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

//! # Ledger Error Type
//!
//! The one error type callers of the engine see.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Ledger Engine                      │
//! │                                                                         │
//! │  Caller (HTTP layer)           Engine                                   │
//! │  ───────────────────           ──────                                   │
//! │                                                                         │
//! │  ledger.create_sale(..)                                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Operation  → Result<T, LedgerError>                             │  │
//! │  │         │                                                        │  │
//! │  │  ValidationError ─────────────┐                                  │  │
//! │  │  CoreError (stock, credit) ───┼──► LedgerError ──► to_response() │  │
//! │  │  DbError (store) ─────────────┘                                  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for product ...: available 2, ..." }  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use ts_rs::TS;

use duka_core::{CoreError, Money, ValidationError};
use duka_db::DbError;

/// Errors returned by every ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input rejected before any write happened.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Product, sale, customer or category absent, or owned by another shop.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Another active product of the shop already uses the barcode.
    #[error("Barcode '{barcode}' is already used by an active product")]
    DuplicateBarcode { barcode: String },

    /// A sale failed after its first write. Its effects were rolled back;
    /// `unresolved` counts rollback steps that failed themselves.
    #[error("Sale creation failed: {reason} ({unresolved} unresolved rollback steps)")]
    SaleCreationFailed { reason: String, unresolved: usize },

    /// The store can't be reached (connection failed, pool exhausted or closed).
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Sale {sale_id} is {status}, cannot perform operation")]
    InvalidSaleStatus { sale_id: String, status: String },

    #[error("Credit limit exceeded for customer {customer_id}: limit {limit}, balance would be {attempted}")]
    CreditLimitExceeded {
        customer_id: String,
        limit: Money,
        attempted: Money,
    },

    /// Any other store failure.
    #[error("Store error: {0}")]
    Store(String),
}

/// Machine-readable error codes.
///
/// ```typescript
/// switch (e.code) {
///   case 'INSUFFICIENT_STOCK': showStockWarning(e.message); break;
///   case 'DUPLICATE_BARCODE':  highlightBarcodeField(); break;
///   default:                   showError(e.message);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InsufficientStock,
    DuplicateBarcode,
    SaleCreationFailed,
    StoreUnavailable,
    InvalidSaleStatus,
    CreditLimitExceeded,
    StoreError,
}

/// What the caller receives when an operation fails.
///
/// ```json
/// { "code": "NOT_FOUND", "message": "Sale not found: 7f1c..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::Validation(_) => ErrorCode::ValidationError,
            LedgerError::NotFound { .. } => ErrorCode::NotFound,
            LedgerError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            LedgerError::DuplicateBarcode { .. } => ErrorCode::DuplicateBarcode,
            LedgerError::SaleCreationFailed { .. } => ErrorCode::SaleCreationFailed,
            LedgerError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            LedgerError::InvalidSaleStatus { .. } => ErrorCode::InvalidSaleStatus,
            LedgerError::CreditLimitExceeded { .. } => ErrorCode::CreditLimitExceeded,
            LedgerError::Store(_) => ErrorCode::StoreError,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Converts store errors.
///
/// Unique violations that need a domain meaning (barcodes) are mapped by the
/// caller before this conversion runs.
impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            return LedgerError::StoreUnavailable(err.to_string());
        }
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                LedgerError::Validation(ValidationError::Duplicate { field, value })
            }
            DbError::QueryFailed(message) => {
                error!(%message, "Store query failed");
                LedgerError::Store(message)
            }
            other => LedgerError::Store(other.to_string()),
        }
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => LedgerError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            CoreError::InvalidSaleStatus { sale_id, status } => {
                LedgerError::InvalidSaleStatus { sale_id, status }
            }
            CoreError::CreditLimitExceeded {
                customer_id,
                limit,
                attempted,
            } => LedgerError::CreditLimitExceeded {
                customer_id,
                limit,
                attempted,
            },
            CoreError::Validation(e) => LedgerError::Validation(e),
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_classified() {
        let err: LedgerError = DbError::PoolExhausted.into();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);

        let err: LedgerError = DbError::ConnectionFailed("closed".into()).into();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);

        let err: LedgerError = DbError::not_found("Sale", "s-1").into();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.to_string(), "Sale not found: s-1");

        let err: LedgerError = DbError::duplicate("name", "Drinks").into();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err: LedgerError = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::StoreError);
    }

    #[test]
    fn test_response_serialization() {
        let err: LedgerError = CoreError::InsufficientStock {
            product_id: "p-1".into(),
            available: 2,
            requested: 3,
        }
        .into();

        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_STOCK");
        assert_eq!(
            json["message"],
            "Insufficient stock for product p-1: available 2, requested 3"
        );

        let json = serde_json::to_value(ErrorCode::SaleCreationFailed).unwrap();
        assert_eq!(json, "SALE_CREATION_FAILED");
    }
}

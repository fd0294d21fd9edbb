//! # duka-core: Pure Business Logic for the Duka Ledger Engine
//!
//! Every rule the ledger engine enforces that does not need the store lives
//! here as a pure function: sale pricing, stock sufficiency, credit limits,
//! the sale status machine and input validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Duka Ledger Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Request handlers (HTTP, out of scope)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 duka-ledger (engine services)                   │   │
//! │  │   Catalog • StockLedger • CostLayers • Credit • Sales           │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼────────────────────┐  │
//! │  │  ★ duka-core (THIS CRATE) ★  │  │   duka-db (SQLite repositories)│  │
//! │  │  types • money • pricing     │  │   one statement per call       │  │
//! │  │  validation • errors         │  │                                 │  │
//! │  └─────────────────────────────┘  └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Product, StockMovement, CostLayer, Sale, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Line totals, sale totals, per-product stock demand
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use duka_core::money::Money;
//! use duka_core::pricing::{price_line, SaleTotals};
//!
//! let line = price_line("p-1", 3, Money::from_cents(250), Money::zero()).unwrap();
//! let totals = SaleTotals::compute(&[line], Money::from_cents(50), Money::from_cents(100)).unwrap();
//!
//! // 3 × 2.50 = 7.50, minus 0.50 discount, plus 1.00 tax
//! assert_eq!(totals.final_amount.cents(), 800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines in a single sale.
pub const MAX_SALE_ITEMS: usize = 200;

/// Maximum quantity of a single line.
///
/// Guards against typing 100000 instead of 10 at the till.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;

/// Maximum length of free-text notes on sales, movements and receipts.
pub const MAX_NOTES_LEN: usize = 500;

/// Unit assigned to products created without one.
pub const DEFAULT_UNIT: &str = "pcs";

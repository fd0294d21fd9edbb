//! # duka-db: Store Layer for the Duka Ledger Engine
//!
//! SQLite access for the ledger engine through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Duka Ledger Data Flow                            │
//! │                                                                         │
//! │  duka-ledger (SaleCoordinator, StockLedger, ...)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     duka-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │   │   │
//! │  │   │               │    │ ProductRepo    │   │ 001_initial_ │   │   │
//! │  │   │ SqlitePool    │◄───│ MovementRepo   │   │ schema.sql   │   │   │
//! │  │   │               │    │ CostLayerRepo  │   │              │   │   │
//! │  │   │               │    │ SaleRepo ...   │   │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every repository method issues exactly one statement. Nothing here opens
//! a transaction that spans calls; multi-step consistency is the engine's
//! job.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duka_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./duka.db")).await?;
//! let product = db.products().get_by_id("shop-1", "uuid-here").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::category::CategoryRepository;
pub use repository::cost_layer::CostLayerRepository;
pub use repository::customer::CustomerRepository;
pub use repository::movement::{MovementFilter, StockMovementRepository};
pub use repository::product::{ProductFilter, ProductRepository};
pub use repository::sale::{SaleFilter, SaleRepository};
pub use repository::sequence::SaleSequenceRepository;

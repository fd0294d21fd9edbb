//! # Repository Module
//!
//! One repository per table.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  StockLedger::apply_stock_delta                                        │
//! │       │                                                                 │
//! │       │  db.products().apply_stock_delta(shop, id, -3)                 │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── get_by_id(&self, shop_id, id)                                     │
//! │  ├── insert(&self, product)                                            │
//! │  ├── apply_stock_delta(&self, shop_id, id, delta)                      │
//! │  └── soft_delete(&self, shop_id, id)                                   │
//! │       │                                                                 │
//! │       │  exactly one SQL statement                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every lookup takes the owning `shop_id`; a row of another shop is
//! indistinguishable from a missing row.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Products, conditional stock updates
//! - [`category::CategoryRepository`] - Product categories
//! - [`movement::StockMovementRepository`] - Append-only stock audit log
//! - [`cost_layer::CostLayerRepository`] - FIFO cost layers and draws
//! - [`customer::CustomerRepository`] - Customers and credit balances
//! - [`sale::SaleRepository`] - Sales, sale items, status transitions
//! - [`sequence::SaleSequenceRepository`] - Per-shop sale number counter

pub mod category;
pub mod cost_layer;
pub mod customer;
pub mod movement;
pub mod product;
pub mod sale;
pub mod sequence;

//! # duka-ledger: Inventory & Sales Ledger Engine
//!
//! The business operations of Duka POS for many shops sharing one store.
//! Every operation is scoped by a shop id and attributed to an actor id;
//! authenticating either is the caller's job.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Ledger (facade)                            │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────────────────────────────────────┐   │
//! │  │   Catalog    │   │              SaleCoordinator                 │   │
//! │  │ products,    │   │  create_sale / cancel_sale                   │   │
//! │  │ receipts,    │   │  CompensationLog ──► Compensator::unwind     │   │
//! │  │ categories   │   └───────┬──────────────────┬────────────┬──────┘   │
//! │  └──────┬───────┘           │                  │            │          │
//! │         │                   ▼                  ▼            ▼          │
//! │         │           ┌──────────────┐ ┌──────────────────┐ ┌─────────┐  │
//! │         └─────────► │ StockLedger  │ │CostLayerAccountant│ │ Credit  │  │
//! │                     │ qty+movement │ │ FIFO layers/draws │ │ Ledger  │  │
//! │                     └──────┬───────┘ └─────────┬────────┘ └────┬────┘  │
//! │                            └───────────────────┼───────────────┘       │
//! │                                                ▼                        │
//! │                                  duka-db (one statement per call)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! The store has no multi-statement transactions. Stock, layer and credit
//! changes are single conditional updates, so concurrent sales never drive
//! stock below zero. Operations that span several writes keep a
//! [`saga::CompensationLog`] and undo completed steps when a later one fails.
//!
//! ## Modules
//!
//! - [`catalog`] - Products, categories, stock receipts, duplicate checks
//! - [`stock`] - Stock quantities and the movement log
//! - [`cost_layers`] - FIFO cost layers
//! - [`credit`] - Customers and credit balances
//! - [`sales`] - Sale creation and cancellation
//! - [`saga`] - Compensation log
//! - [`config`] - `DUKA_*` environment configuration
//! - [`error`] - `LedgerError` and the `{ code, message }` response shape
//! - [`telemetry`] - tracing subscriber setup

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod cost_layers;
pub mod credit;
pub mod error;
pub mod saga;
pub mod sales;
pub mod stock;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::Catalog;
pub use config::{ConfigError, LedgerConfig};
pub use cost_layers::{CostLayerAccountant, FifoDraw};
pub use credit::CreditLedger;
pub use error::{ErrorCode, ErrorResponse, LedgerError, LedgerResult};
pub use sales::SaleCoordinator;
pub use stock::StockLedger;
pub use telemetry::init_tracing;

pub use duka_db::{Database, DbConfig, MovementFilter, ProductFilter, SaleFilter};

use duka_core::{
    Category, CostLayer, Customer, DuplicateCheck, Money, NewCategory, NewCustomer, NewProduct,
    NewSale, Product, ProductUpdate, Sale, SaleDetail, StockMovement, StockReceipt,
};
use tracing::info;

// =============================================================================
// Ledger
// =============================================================================

/// Every ledger service over one store.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    catalog: Catalog,
    stock: StockLedger,
    cost_layers: CostLayerAccountant,
    credit: CreditLedger,
    sales: SaleCoordinator,
}

impl Ledger {
    /// Opens the store described by `config` and builds the services.
    pub async fn connect(config: &LedgerConfig) -> LedgerResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(
            path = %config.database_path.display(),
            consume_cost_layers = config.consume_cost_layers,
            "Ledger connected"
        );
        Ok(Self::new(db, config))
    }

    /// Builds the services over an open store.
    pub fn new(db: Database, config: &LedgerConfig) -> Self {
        let stock = StockLedger::new(db.clone(), config.stock_history_limit);
        Ledger {
            catalog: Catalog::new(db.clone(), stock.clone(), config.duplicate_name_matches),
            cost_layers: CostLayerAccountant::new(db.clone()),
            credit: CreditLedger::new(db.clone()),
            sales: SaleCoordinator::new(
                db.clone(),
                stock.clone(),
                config.sale_number_attempts,
                config.consume_cost_layers,
            ),
            stock,
            db,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stock(&self) -> &StockLedger {
        &self.stock
    }

    pub fn cost_layers(&self) -> &CostLayerAccountant {
        &self.cost_layers
    }

    pub fn credit(&self) -> &CreditLedger {
        &self.credit
    }

    pub fn sales(&self) -> &SaleCoordinator {
        &self.sales
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn create_product(&self, shop_id: &str, actor_id: &str, input: NewProduct) -> LedgerResult<Product> {
        self.catalog.create_product(shop_id, actor_id, input).await
    }

    pub async fn receive_stock(
        &self,
        shop_id: &str,
        actor_id: &str,
        product_id: &str,
        receipt: StockReceipt,
    ) -> LedgerResult<Product> {
        self.catalog.receive_stock(shop_id, actor_id, product_id, receipt).await
    }

    pub async fn update_product(
        &self,
        shop_id: &str,
        actor_id: &str,
        product_id: &str,
        update: ProductUpdate,
    ) -> LedgerResult<Product> {
        self.catalog.update_product(shop_id, actor_id, product_id, update).await
    }

    pub async fn delete_product(&self, shop_id: &str, product_id: &str) -> LedgerResult<()> {
        self.catalog.delete_product(shop_id, product_id).await
    }

    pub async fn check_duplicate(
        &self,
        shop_id: &str,
        barcode: Option<&str>,
        name: Option<&str>,
    ) -> LedgerResult<DuplicateCheck> {
        self.catalog.check_duplicate(shop_id, barcode, name).await
    }

    pub async fn get_products(&self, shop_id: &str, filter: &ProductFilter) -> LedgerResult<Vec<Product>> {
        self.catalog.get_products(shop_id, filter).await
    }

    pub async fn get_product_by_id(&self, shop_id: &str, product_id: &str) -> LedgerResult<Product> {
        self.catalog.get_product_by_id(shop_id, product_id).await
    }

    pub async fn get_product_by_barcode(&self, shop_id: &str, barcode: &str) -> LedgerResult<Product> {
        self.catalog.get_product_by_barcode(shop_id, barcode).await
    }

    pub async fn create_category(&self, shop_id: &str, input: NewCategory) -> LedgerResult<Category> {
        self.catalog.create_category(shop_id, input).await
    }

    pub async fn list_categories(&self, shop_id: &str) -> LedgerResult<Vec<Category>> {
        self.catalog.list_categories(shop_id).await
    }

    // =========================================================================
    // Stock & Cost Layers
    // =========================================================================

    pub async fn get_stock_history(
        &self,
        shop_id: &str,
        filter: &MovementFilter,
    ) -> LedgerResult<Vec<StockMovement>> {
        self.stock.stock_history(shop_id, filter).await
    }

    pub async fn list_cost_layers(
        &self,
        shop_id: &str,
        product_id: &str,
        only_open: bool,
    ) -> LedgerResult<Vec<CostLayer>> {
        self.cost_layers.list_layers(shop_id, product_id, only_open).await
    }

    // =========================================================================
    // Sales
    // =========================================================================

    pub async fn create_sale(&self, shop_id: &str, actor_id: &str, input: NewSale) -> LedgerResult<SaleDetail> {
        self.sales.create_sale(shop_id, actor_id, input).await
    }

    pub async fn cancel_sale(&self, shop_id: &str, sale_id: &str, actor_id: &str) -> LedgerResult<SaleDetail> {
        self.sales.cancel_sale(shop_id, sale_id, actor_id).await
    }

    pub async fn get_sale_by_id(&self, shop_id: &str, sale_id: &str) -> LedgerResult<SaleDetail> {
        self.sales.get_sale_by_id(shop_id, sale_id).await
    }

    pub async fn get_sales(&self, shop_id: &str, filter: &SaleFilter) -> LedgerResult<Vec<Sale>> {
        self.sales.get_sales(shop_id, filter).await
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn create_customer(&self, shop_id: &str, input: NewCustomer) -> LedgerResult<Customer> {
        self.credit.create_customer(shop_id, input).await
    }

    pub async fn get_customer(&self, shop_id: &str, customer_id: &str) -> LedgerResult<Customer> {
        self.credit.get_customer(shop_id, customer_id).await
    }

    pub async fn list_customers(&self, shop_id: &str) -> LedgerResult<Vec<Customer>> {
        self.credit.list_customers(shop_id).await
    }

    pub async fn record_repayment(&self, shop_id: &str, customer_id: &str, amount: Money) -> LedgerResult<Customer> {
        self.credit.record_repayment(shop_id, customer_id, amount).await
    }
}

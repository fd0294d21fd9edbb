//! Shared fixtures for the ledger integration tests.

#![allow(dead_code)]

use duka_core::{Customer, NewCustomer, NewProduct, NewSale, NewSaleItem, PaymentMethod, Product};
use duka_ledger::{Database, DbConfig, Ledger, LedgerConfig, MovementFilter};

pub const SHOP: &str = "shop-1";
pub const OTHER_SHOP: &str = "shop-2";
pub const ACTOR: &str = "cashier-1";

/// A ledger over a fresh in-memory database.
pub async fn ledger() -> Ledger {
    ledger_with(LedgerConfig::default()).await
}

pub async fn ledger_with(config: LedgerConfig) -> Ledger {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Ledger::new(db, &config)
}

pub async fn product(ledger: &Ledger, name: &str, price_cents: i64, stock: i64) -> Product {
    ledger
        .create_product(
            SHOP,
            ACTOR,
            NewProduct {
                name: name.to_string(),
                cost_price_cents: price_cents / 2,
                selling_price_cents: price_cents,
                stock_quantity: stock,
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

pub async fn customer(ledger: &Ledger, credit_limit_cents: Option<i64>) -> Customer {
    ledger
        .create_customer(
            SHOP,
            NewCustomer {
                name: "Baraka Mwangi".to_string(),
                credit_limit_cents,
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

pub fn cash_sale(items: &[(&str, i64)]) -> NewSale {
    NewSale::new(
        PaymentMethod::Cash,
        items
            .iter()
            .map(|(product_id, qty)| NewSaleItem::new(*product_id, *qty))
            .collect(),
    )
}

pub fn credit_sale(customer_id: &str, items: &[(&str, i64)]) -> NewSale {
    let mut sale = cash_sale(items);
    sale.payment_method = PaymentMethod::Credit;
    sale.customer_id = Some(customer_id.to_string());
    sale
}

pub async fn stock_of(ledger: &Ledger, product_id: &str) -> i64 {
    ledger
        .get_product_by_id(SHOP, product_id)
        .await
        .unwrap()
        .stock_quantity
}

/// Stock must equal the replay of its movements.
pub async fn assert_replays(ledger: &Ledger, product_id: &str) {
    let stock = stock_of(ledger, product_id).await;
    let replayed = ledger.stock().replay_quantity(SHOP, product_id).await.unwrap();
    assert_eq!(stock, replayed, "stock of {product_id} does not match its movements");
    assert!(stock >= 0);
}

pub async fn movements_of(ledger: &Ledger, product_id: &str) -> Vec<duka_core::StockMovement> {
    ledger
        .get_stock_history(
            SHOP,
            &MovementFilter {
                product_id: Some(product_id.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
}

/// Makes every statement of `event` on `table` fail.
pub async fn inject_fault(ledger: &Ledger, name: &str, event: &str, table: &str) {
    inject_fault_when(ledger, name, event, table, "1").await;
}

/// Makes `event` on `table` fail for rows matching `condition`
/// (which may refer to `OLD` or `NEW`).
pub async fn inject_fault_when(
    ledger: &Ledger,
    name: &str,
    event: &str,
    table: &str,
    condition: &str,
) {
    let sql = format!(
        "CREATE TRIGGER {name} BEFORE {event} ON {table} WHEN {condition} \
         BEGIN SELECT RAISE(ABORT, 'injected fault'); END"
    );
    sqlx::query(&sql).execute(ledger.db().pool()).await.unwrap();
}

pub async fn clear_fault(ledger: &Ledger, name: &str) {
    sqlx::query(&format!("DROP TRIGGER {name}"))
        .execute(ledger.db().pool())
        .await
        .unwrap();
}

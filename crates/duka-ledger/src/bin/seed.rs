//! # Demo Shop Seeder
//!
//! Populates a database with one demo shop for development: categories,
//! products with opening stock, a stock receipt, a credit customer and a few
//! sales, all through the ledger so movements and cost layers are written
//! the same way the live system writes them.
//!
//! ## Usage
//! ```bash
//! # Seed $DUKA_DATABASE_PATH (default ./duka.db)
//! cargo run -p duka-ledger --bin seed
//!
//! # Specify database path and shop id
//! cargo run -p duka-ledger --bin seed -- --db ./data/duka.db --shop shop-demo
//! ```

use std::env;

use duka_core::{
    Money, NewCategory, NewCustomer, NewProduct, NewSale, NewSaleItem, PaymentMethod, StockReceipt,
};
use duka_ledger::{init_tracing, Ledger, LedgerConfig, MovementFilter};

const SEED_ACTOR: &str = "seed";

/// (category, [(name, barcode, cost cents, price cents, opening stock)])
const CATALOG: &[(&str, &[(&str, &str, i64, i64, i64)])] = &[
    (
        "Beverages",
        &[
            ("Coca-Cola 500ml", "5449000000996", 90, 150, 48),
            ("Fanta Orange 500ml", "5449000011527", 90, 150, 36),
            ("Kilimanjaro Water 1L", "6203000000017", 50, 100, 60),
            ("Azam Mango Juice 250ml", "6203000000024", 60, 120, 24),
        ],
    ),
    (
        "Grocery",
        &[
            ("Sugar 1kg", "6203000001014", 250, 320, 30),
            ("Rice 5kg", "6203000001021", 1100, 1450, 12),
            ("Cooking Oil 1L", "6203000001038", 400, 550, 18),
            ("Maize Flour 2kg", "6203000001045", 280, 360, 25),
        ],
    ),
    (
        "Household",
        &[
            ("Bar Soap", "6203000002011", 80, 130, 40),
            ("Matches (10 pack)", "6203000002028", 30, 60, 50),
            ("Candles (6 pack)", "6203000002035", 120, 200, 0),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut config = LedgerConfig::from_env()?;
    let mut shop_id = String::from("shop-demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--shop" | "-s" => {
                if i + 1 < args.len() {
                    shop_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Duka POS Demo Shop Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $DUKA_DATABASE_PATH or ./duka.db)");
                println!("  -s, --shop <ID>    Shop id to seed (default: shop-demo)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();

    println!("🌱 Duka POS Demo Shop Seeder");
    println!("============================");
    println!("Database: {}", config.database_path.display());
    println!("Shop:     {}", shop_id);
    println!();

    let ledger = Ledger::connect(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = ledger.db().products().count(&shop_id).await?;
    if existing > 0 {
        println!("⚠ Shop already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    let mut product_ids = Vec::new();
    for (category_name, products) in CATALOG {
        let category = ledger
            .create_category(
                &shop_id,
                NewCategory {
                    name: category_name.to_string(),
                    description: None,
                },
            )
            .await?;

        for (name, barcode, cost, price, stock) in products.iter() {
            let product = ledger
                .create_product(
                    &shop_id,
                    SEED_ACTOR,
                    NewProduct {
                        name: name.to_string(),
                        barcode: Some(barcode.to_string()),
                        category_id: Some(category.id.clone()),
                        cost_price_cents: *cost,
                        selling_price_cents: *price,
                        stock_quantity: *stock,
                        min_stock_level: 5,
                        ..Default::default()
                    },
                )
                .await?;
            product_ids.push(product.id);
        }
        println!("✓ {}: {} products", category_name, products.len());
    }

    // A delivery at a higher cost opens a second layer for the first product.
    let restocked = ledger
        .receive_stock(
            &shop_id,
            SEED_ACTOR,
            &product_ids[0],
            StockReceipt {
                quantity: 24,
                unit_cost_cents: Some(95),
                reference: Some("PO-0001".to_string()),
                notes: None,
            },
        )
        .await?;
    println!("✓ Received 24 × {} (stock now {})", restocked.name, restocked.stock_quantity);

    let customer = ledger
        .create_customer(
            &shop_id,
            NewCustomer {
                name: "Amina Hassan".to_string(),
                phone: Some("+255712000111".to_string()),
                credit_limit_cents: Some(50_000),
                ..Default::default()
            },
        )
        .await?;
    println!("✓ Customer {} (limit {})", customer.name, Money::from_cents(50_000));

    // Sales
    let cash = ledger
        .create_sale(
            &shop_id,
            SEED_ACTOR,
            NewSale::new(
                PaymentMethod::Cash,
                vec![NewSaleItem::new(&product_ids[0], 3), NewSaleItem::new(&product_ids[4], 1)],
            ),
        )
        .await?;
    println!("✓ Sale {} ({})", cash.sale.sale_number, cash.sale.final_amount());

    let mut on_credit = NewSale::new(
        PaymentMethod::Credit,
        vec![NewSaleItem::new(&product_ids[5], 1), NewSaleItem::new(&product_ids[6], 2)],
    );
    on_credit.customer_id = Some(customer.id.clone());
    let credit_sale = ledger.create_sale(&shop_id, SEED_ACTOR, on_credit).await?;
    println!(
        "✓ Sale {} ({}) on credit to {}",
        credit_sale.sale.sale_number,
        credit_sale.sale.final_amount(),
        customer.name
    );

    let voided = ledger
        .create_sale(
            &shop_id,
            SEED_ACTOR,
            NewSale::new(PaymentMethod::MobileMoney, vec![NewSaleItem::new(&product_ids[8], 2)]),
        )
        .await?;
    ledger.cancel_sale(&shop_id, &voided.sale.id, SEED_ACTOR).await?;
    println!("✓ Sale {} cancelled", voided.sale.sale_number);

    let repaid = ledger
        .record_repayment(&shop_id, &customer.id, Money::from_cents(1_000))
        .await?;
    println!("✓ Repayment recorded, {} owes {}", repaid.name, repaid.credit_balance());

    let movements = ledger
        .get_stock_history(&shop_id, &MovementFilter::default())
        .await?;

    println!();
    println!("✓ Seed complete! {} stock movements recorded", movements.len());

    Ok(())
}

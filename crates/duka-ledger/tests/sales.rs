//! Sale creation and cancellation against an in-memory store.

mod common;

use common::*;
use duka_core::{NewSaleItem, PaymentMethod, SaleStatus, StockAction, StockReceipt};
use duka_ledger::{LedgerConfig, LedgerError, MovementFilter, SaleFilter};

#[tokio::test]
async fn test_sell_three_of_ten() {
    let ledger = ledger().await;
    let soda = product(&ledger, "Soda 500ml", 250, 10).await;

    let detail = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&soda.id, 3)]))
        .await
        .unwrap();

    assert_eq!(detail.sale.status, SaleStatus::Completed);
    assert_eq!(detail.sale.total_amount_cents, 750);
    assert_eq!(detail.sale.final_amount_cents, 750);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].item.total_price_cents, 750);
    assert_eq!(
        detail.items[0].product.as_ref().map(|p| p.name.as_str()),
        Some("Soda 500ml")
    );
    assert_eq!(stock_of(&ledger, &soda.id).await, 7);

    let sales = ledger
        .get_stock_history(
            SHOP,
            &MovementFilter {
                product_id: Some(soda.id.clone()),
                action: Some(StockAction::Sale),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].quantity, 3);
    assert_eq!(sales[0].previous_quantity, 10);
    assert_eq!(sales[0].new_quantity, 7);
    assert_eq!(sales[0].actor_id, ACTOR);
    assert_eq!(
        sales[0].notes.as_deref(),
        Some(format!("Sale {}", detail.sale.sale_number).as_str())
    );

    assert_replays(&ledger, &soda.id).await;
}

#[tokio::test]
async fn test_insufficient_stock_writes_nothing() {
    let ledger = ledger().await;
    let rice = product(&ledger, "Rice 5kg", 1450, 2).await;

    let err = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&rice.id, 3)]))
        .await
        .unwrap_err();

    match err {
        LedgerError::InsufficientStock {
            product_id,
            available,
            requested,
        } => {
            assert_eq!(product_id, rice.id);
            assert_eq!(available, 2);
            assert_eq!(requested, 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(ledger.db().sales().count(SHOP).await.unwrap(), 0);
    assert_eq!(stock_of(&ledger, &rice.id).await, 2);
    // Only the opening stock receipt.
    assert_eq!(movements_of(&ledger, &rice.id).await.len(), 1);
}

#[tokio::test]
async fn test_lines_of_one_product_are_checked_together() {
    let ledger = ledger().await;
    let sugar = product(&ledger, "Sugar 1kg", 320, 4).await;

    let err = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&sugar.id, 3), (&sugar.id, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientStock { requested: 5, .. }
    ));
    assert_eq!(stock_of(&ledger, &sugar.id).await, 4);
}

#[tokio::test]
async fn test_credit_sale_and_cancellation() {
    let ledger = ledger().await;
    let oil = product(&ledger, "Cooking Oil 5L", 5_000, 10).await;
    let customer = customer(&ledger, None).await;

    let detail = ledger
        .create_sale(SHOP, ACTOR, credit_sale(&customer.id, &[(&oil.id, 1)]))
        .await
        .unwrap();
    assert_eq!(detail.sale.final_amount_cents, 5_000);
    assert_eq!(
        detail.customer.as_ref().map(|c| c.credit_balance_cents),
        Some(5_000)
    );

    let cancelled = ledger
        .cancel_sale(SHOP, &detail.sale.id, ACTOR)
        .await
        .unwrap();
    assert_eq!(cancelled.sale.status, SaleStatus::Cancelled);
    assert_eq!(
        ledger
            .get_customer(SHOP, &customer.id)
            .await
            .unwrap()
            .credit_balance_cents,
        0
    );
    assert_eq!(stock_of(&ledger, &oil.id).await, 10);
    assert_replays(&ledger, &oil.id).await;
}

#[tokio::test]
async fn test_cash_sale_with_customer_leaves_balance() {
    let ledger = ledger().await;
    let soap = product(&ledger, "Bar Soap", 130, 10).await;
    let customer = customer(&ledger, None).await;

    let mut input = cash_sale(&[(&soap.id, 2)]);
    input.customer_id = Some(customer.id.clone());
    let detail = ledger.create_sale(SHOP, ACTOR, input).await.unwrap();

    assert_eq!(detail.sale.customer_id.as_deref(), Some(customer.id.as_str()));
    ledger.cancel_sale(SHOP, &detail.sale.id, ACTOR).await.unwrap();

    let after = ledger.get_customer(SHOP, &customer.id).await.unwrap();
    assert_eq!(after.credit_balance_cents, 0);
}

#[tokio::test]
async fn test_credit_sale_without_customer_is_recorded() {
    let ledger = ledger().await;
    let matches = product(&ledger, "Matches", 60, 10).await;

    let mut input = cash_sale(&[(&matches.id, 1)]);
    input.payment_method = PaymentMethod::Credit;
    let detail = ledger.create_sale(SHOP, ACTOR, input).await.unwrap();

    assert_eq!(detail.sale.payment_method, PaymentMethod::Credit);
    assert!(detail.sale.customer_id.is_none());
    assert!(detail.customer.is_none());
}

#[tokio::test]
async fn test_totals_with_discounts_tax_and_price_override() {
    let ledger = ledger().await;
    let juice = product(&ledger, "Mango Juice", 250, 10).await;
    let water = product(&ledger, "Water 1L", 100, 10).await;

    let mut input = cash_sale(&[]);
    input.items = vec![
        NewSaleItem {
            discount_amount_cents: 50,
            ..NewSaleItem::new(&juice.id, 2)
        },
        NewSaleItem {
            unit_price_cents: Some(90),
            ..NewSaleItem::new(&water.id, 3)
        },
    ];
    input.discount_amount_cents = 100;
    input.tax_amount_cents = 80;

    let detail = ledger.create_sale(SHOP, ACTOR, input).await.unwrap();

    // 2 × 2.50 - 0.50 = 4.50, 3 × 0.90 = 2.70
    assert_eq!(detail.sale.total_amount_cents, 720);
    assert_eq!(detail.sale.discount_amount_cents, 100);
    assert_eq!(detail.sale.tax_amount_cents, 80);
    assert_eq!(detail.sale.final_amount_cents, 700);

    let line_sum: i64 = detail.items.iter().map(|d| d.item.total_price_cents).sum();
    assert_eq!(line_sum, detail.sale.total_amount_cents);
}

#[tokio::test]
async fn test_rejected_requests() {
    let ledger = ledger().await;
    let soda = product(&ledger, "Soda", 150, 10).await;

    // No lines
    let err = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // Discount above the line amount
    let mut input = cash_sale(&[(&soda.id, 1)]);
    input.discount_amount_cents = 151;
    let err = ledger.create_sale(SHOP, ACTOR, input).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // Unknown product
    let err = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[("no-such-product", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    // Another shop's product
    let err = ledger
        .create_sale(OTHER_SHOP, ACTOR, cash_sale(&[(&soda.id, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    // Another shop's customer
    let stranger = customer(&ledger, None).await;
    let mut input = cash_sale(&[(&soda.id, 1)]);
    input.customer_id = Some(stranger.id.clone());
    let err = ledger.create_sale(OTHER_SHOP, ACTOR, input).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    // Soft-deleted product
    ledger.delete_product(SHOP, &soda.id).await.unwrap();
    let err = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&soda.id, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    assert_eq!(ledger.db().sales().count(SHOP).await.unwrap(), 0);
    assert_eq!(stock_of(&ledger, &soda.id).await, 10);
}

#[tokio::test]
async fn test_credit_limit() {
    let ledger = ledger().await;
    let rice = product(&ledger, "Rice 5kg", 6_000, 10).await;
    let customer = customer(&ledger, Some(10_000)).await;

    ledger
        .create_sale(SHOP, ACTOR, credit_sale(&customer.id, &[(&rice.id, 1)]))
        .await
        .unwrap();

    let err = ledger
        .create_sale(SHOP, ACTOR, credit_sale(&customer.id, &[(&rice.id, 1)]))
        .await
        .unwrap_err();
    match err {
        LedgerError::CreditLimitExceeded {
            customer_id,
            limit,
            attempted,
        } => {
            assert_eq!(customer_id, customer.id);
            assert_eq!(limit.cents(), 10_000);
            assert_eq!(attempted.cents(), 12_000);
        }
        other => panic!("expected CreditLimitExceeded, got {other:?}"),
    }

    let after = ledger.get_customer(SHOP, &customer.id).await.unwrap();
    assert_eq!(after.credit_balance_cents, 6_000);
    assert_eq!(stock_of(&ledger, &rice.id).await, 9);
}

#[tokio::test]
async fn test_second_cancel_is_rejected() {
    let ledger = ledger().await;
    let flour = product(&ledger, "Maize Flour", 360, 10).await;

    let detail = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&flour.id, 4)]))
        .await
        .unwrap();
    ledger.cancel_sale(SHOP, &detail.sale.id, ACTOR).await.unwrap();
    assert_eq!(stock_of(&ledger, &flour.id).await, 10);

    let err = ledger
        .cancel_sale(SHOP, &detail.sale.id, ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidSaleStatus { .. }));
    assert_eq!(stock_of(&ledger, &flour.id).await, 10);

    let err = ledger
        .cancel_sale(OTHER_SHOP, &detail.sale.id, ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    // sale, cancellation adjustment and the opening receipt
    let movements = movements_of(&ledger, &flour.id).await;
    assert_eq!(movements.len(), 3);
    assert_eq!(movements[0].action, StockAction::Adjustment);
    assert_eq!(movements[0].delta(), 4);
    assert_replays(&ledger, &flour.id).await;
}

#[tokio::test]
async fn test_concurrent_sales_never_oversell() {
    let ledger = ledger().await;
    let bread = product(&ledger, "Bread", 200, 5).await;

    let (first, second) = tokio::join!(
        ledger.create_sale(SHOP, ACTOR, cash_sale(&[(&bread.id, 3)])),
        ledger.create_sale(SHOP, "cashier-2", cash_sale(&[(&bread.id, 3)])),
    );

    let succeeded = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    for result in [first, second] {
        if let Err(err) = result {
            assert!(matches!(err, LedgerError::InsufficientStock { .. }), "{err:?}");
        }
    }

    assert_eq!(stock_of(&ledger, &bread.id).await, 2);
    assert_eq!(ledger.db().sales().count(SHOP).await.unwrap(), 1);
    assert_replays(&ledger, &bread.id).await;
}

#[tokio::test]
async fn test_concurrent_credit_sales_stay_within_limit() {
    let ledger = ledger().await;
    let oil = product(&ledger, "Cooking Oil 1L", 1_000, 20).await;
    let customer = customer(&ledger, Some(10_000)).await;

    let (first, second) = tokio::join!(
        ledger.create_sale(SHOP, ACTOR, credit_sale(&customer.id, &[(&oil.id, 6)])),
        ledger.create_sale(SHOP, "cashier-2", credit_sale(&customer.id, &[(&oil.id, 6)])),
    );

    let succeeded = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    for result in [first, second] {
        if let Err(err) = result {
            assert!(matches!(err, LedgerError::CreditLimitExceeded { .. }), "{err:?}");
        }
    }

    let after = ledger.get_customer(SHOP, &customer.id).await.unwrap();
    assert_eq!(after.credit_balance_cents, 6_000);
    assert_eq!(stock_of(&ledger, &oil.id).await, 14);
    assert_eq!(ledger.db().sales().count(SHOP).await.unwrap(), 1);
    assert_replays(&ledger, &oil.id).await;
}

#[tokio::test]
async fn test_sale_numbers_are_sequential_per_shop() {
    let ledger = ledger().await;
    let soda = product(&ledger, "Soda", 150, 100).await;

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let detail = ledger
            .create_sale(SHOP, ACTOR, cash_sale(&[(&soda.id, 1)]))
            .await
            .unwrap();
        numbers.push(detail.sale.sale_number);
    }

    for (i, number) in numbers.iter().enumerate() {
        assert!(number.starts_with("S-"), "{number}");
        assert_eq!(number.len(), "S-YYYYMMDD-NNNNNN".len());
        assert!(number.ends_with(&format!("-{:06}", i + 1)), "{number}");
    }

    let elsewhere = ledger
        .create_product(
            OTHER_SHOP,
            ACTOR,
            duka_core::NewProduct {
                name: "Soda".to_string(),
                selling_price_cents: 150,
                stock_quantity: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let detail = ledger
        .create_sale(OTHER_SHOP, ACTOR, cash_sale(&[(&elsewhere.id, 1)]))
        .await
        .unwrap();
    assert!(detail.sale.sale_number.ends_with("-000001"));
}

#[tokio::test]
async fn test_sale_reads() {
    let ledger = ledger().await;
    let soda = product(&ledger, "Soda", 150, 20).await;
    let customer = customer(&ledger, None).await;

    let cash = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&soda.id, 1)]))
        .await
        .unwrap();
    let credit = ledger
        .create_sale(SHOP, ACTOR, credit_sale(&customer.id, &[(&soda.id, 2)]))
        .await
        .unwrap();
    ledger.cancel_sale(SHOP, &cash.sale.id, ACTOR).await.unwrap();

    let fetched = ledger.get_sale_by_id(SHOP, &credit.sale.id).await.unwrap();
    assert_eq!(fetched.sale.id, credit.sale.id);
    assert_eq!(fetched.customer.map(|c| c.id), Some(customer.id.clone()));
    assert_eq!(fetched.items.len(), 1);
    assert_eq!(fetched.items[0].item.quantity, 2);

    let all = ledger.get_sales(SHOP, &SaleFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let cancelled = ledger
        .get_sales(
            SHOP,
            &SaleFilter {
                status: Some(SaleStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, cash.sale.id);

    let on_credit = ledger
        .get_sales(
            SHOP,
            &SaleFilter {
                payment_method: Some(PaymentMethod::Credit),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(on_credit.len(), 1);

    assert!(ledger.get_sales(OTHER_SHOP, &SaleFilter::default()).await.unwrap().is_empty());
    let err = ledger.get_sale_by_id(OTHER_SHOP, &credit.sale.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_cancelling_a_repaid_credit_sale() {
    let ledger = ledger().await;
    let oil = product(&ledger, "Cooking Oil", 5_000, 5).await;
    let customer = customer(&ledger, None).await;

    let detail = ledger
        .create_sale(SHOP, ACTOR, credit_sale(&customer.id, &[(&oil.id, 1)]))
        .await
        .unwrap();
    ledger
        .record_repayment(SHOP, &customer.id, duka_core::Money::from_cents(5_000))
        .await
        .unwrap();

    ledger.cancel_sale(SHOP, &detail.sale.id, ACTOR).await.unwrap();

    let after = ledger.get_customer(SHOP, &customer.id).await.unwrap();
    assert_eq!(after.credit_balance_cents, -5_000);
}

#[tokio::test]
async fn test_fifo_draw_and_restore() {
    let ledger = ledger_with(LedgerConfig::default().consume_cost_layers(true)).await;
    let soda = product(&ledger, "Soda", 300, 10).await;
    ledger
        .receive_stock(
            SHOP,
            ACTOR,
            &soda.id,
            StockReceipt {
                quantity: 5,
                unit_cost_cents: Some(200),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let detail = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&soda.id, 12)]))
        .await
        .unwrap();

    let layers = ledger.list_cost_layers(SHOP, &soda.id, false).await.unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0].unit_cost_cents, 150);
    assert_eq!(layers[0].remaining_quantity, 0);
    assert_eq!(layers[1].unit_cost_cents, 200);
    assert_eq!(layers[1].remaining_quantity, 3);
    assert_eq!(ledger.list_cost_layers(SHOP, &soda.id, true).await.unwrap().len(), 1);

    let draws = ledger
        .db()
        .cost_layers()
        .draws_for_sale(&detail.sale.id)
        .await
        .unwrap();
    assert_eq!(draws.len(), 2);
    // 10 × 1.50 + 2 × 2.00
    assert_eq!(duka_ledger::CostLayerAccountant::cost_of_draws(&draws).cents(), 1_900);

    ledger.cancel_sale(SHOP, &detail.sale.id, ACTOR).await.unwrap();

    let layers = ledger.list_cost_layers(SHOP, &soda.id, false).await.unwrap();
    assert_eq!(layers[0].remaining_quantity, 10);
    assert_eq!(layers[1].remaining_quantity, 5);
    assert!(ledger
        .db()
        .cost_layers()
        .draws_for_sale(&detail.sale.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(stock_of(&ledger, &soda.id).await, 15);
}

#[tokio::test]
async fn test_layers_untouched_by_default() {
    let ledger = ledger().await;
    let soda = product(&ledger, "Soda", 300, 10).await;

    let detail = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&soda.id, 4)]))
        .await
        .unwrap();

    let layers = ledger.list_cost_layers(SHOP, &soda.id, false).await.unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].remaining_quantity, 10);
    assert!(ledger
        .db()
        .cost_layers()
        .draws_for_sale(&detail.sale.id)
        .await
        .unwrap()
        .is_empty());
}

//! Catalog, stock receipts and the movement log.

mod common;

use common::*;
use duka_core::{
    CostLayerSource, NewProduct, ProductUpdate, StockAction, StockReceipt,
};
use duka_ledger::{LedgerConfig, LedgerError, MovementFilter, ProductFilter};

fn with_barcode(name: &str, barcode: &str) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        barcode: Some(barcode.to_string()),
        selling_price_cents: 150,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_receive_five_at_two() {
    let ledger = ledger().await;
    let soda = product(&ledger, "Soda", 300, 10).await;

    let updated = ledger
        .receive_stock(
            SHOP,
            ACTOR,
            &soda.id,
            StockReceipt {
                quantity: 5,
                unit_cost_cents: Some(200),
                reference: Some("INV-2291".to_string()),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.stock_quantity, 15);
    assert_eq!(updated.cost_price_cents, 200);

    let layers = ledger.list_cost_layers(SHOP, &soda.id, false).await.unwrap();
    assert_eq!(layers.len(), 2);
    let received = &layers[1];
    assert_eq!(received.source_type, CostLayerSource::Purchase);
    assert_eq!(received.source_id, "INV-2291");
    assert_eq!(received.unit_cost_cents, 200);
    assert_eq!(received.initial_quantity, 5);
    assert_eq!(received.remaining_quantity, 5);

    let purchases = ledger
        .get_stock_history(
            SHOP,
            &MovementFilter {
                product_id: Some(soda.id.clone()),
                action: Some(StockAction::Purchase),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(purchases.len(), 2);
    assert_eq!(purchases[0].previous_quantity, 10);
    assert_eq!(purchases[0].new_quantity, 15);
    assert_eq!(purchases[0].notes.as_deref(), Some("Stock received (INV-2291)"));
}

#[tokio::test]
async fn test_receipt_defaults_to_cost_price() {
    let ledger = ledger().await;
    let soap = product(&ledger, "Soap", 130, 0).await;

    let updated = ledger
        .receive_stock(
            SHOP,
            ACTOR,
            &soap.id,
            StockReceipt {
                quantity: 12,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.stock_quantity, 12);
    assert_eq!(updated.cost_price_cents, soap.cost_price_cents);

    let layers = ledger.list_cost_layers(SHOP, &soap.id, true).await.unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].unit_cost_cents, soap.cost_price_cents);

    let err = ledger
        .receive_stock(
            SHOP,
            ACTOR,
            &soap.id,
            StockReceipt {
                quantity: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    ledger.delete_product(SHOP, &soap.id).await.unwrap();
    let err = ledger
        .receive_stock(
            SHOP,
            ACTOR,
            &soap.id,
            StockReceipt {
                quantity: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_initial_stock_opens_one_layer() {
    let ledger = ledger().await;
    let rice = product(&ledger, "Rice", 1_450, 12).await;
    assert_eq!(rice.stock_quantity, 12);

    let layers = ledger.list_cost_layers(SHOP, &rice.id, false).await.unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].source_type, CostLayerSource::InitialStock);
    assert_eq!(layers[0].source_id, rice.id);
    assert_eq!(layers[0].initial_quantity, 12);
    assert_eq!(layers[0].remaining_quantity, 12);

    let movements = movements_of(&ledger, &rice.id).await;
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].action, StockAction::Purchase);
    assert_eq!(movements[0].notes.as_deref(), Some("Initial stock"));
}

#[tokio::test]
async fn test_duplicate_barcode() {
    let ledger = ledger().await;
    let first = ledger
        .create_product(SHOP, ACTOR, with_barcode("Soda", "5449000000996"))
        .await
        .unwrap();

    let err = ledger
        .create_product(SHOP, ACTOR, with_barcode("Soda (new)", "5449000000996"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateBarcode { .. }));

    // Other shops keep their own barcodes.
    ledger
        .create_product(OTHER_SHOP, ACTOR, with_barcode("Soda", "5449000000996"))
        .await
        .unwrap();

    // A soft-deleted product releases its barcode.
    ledger.delete_product(SHOP, &first.id).await.unwrap();
    let second = ledger
        .create_product(SHOP, ACTOR, with_barcode("Soda (new)", "5449000000996"))
        .await
        .unwrap();

    let found = ledger
        .get_product_by_barcode(SHOP, "5449000000996")
        .await
        .unwrap();
    assert_eq!(found.id, second.id);

    let deleted = ledger.get_product_by_id(SHOP, &first.id).await.unwrap();
    assert!(!deleted.is_active);

    // Updating onto a taken barcode
    let third = ledger
        .create_product(SHOP, ACTOR, with_barcode("Water", "6203000000017"))
        .await
        .unwrap();
    let err = ledger
        .update_product(
            SHOP,
            ACTOR,
            &third.id,
            ProductUpdate {
                barcode: Some("5449000000996".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateBarcode { .. }));
}

#[tokio::test]
async fn test_replay_after_mixed_activity() {
    let ledger = ledger().await;
    let flour = product(&ledger, "Flour", 360, 20).await;
    let customer = customer(&ledger, None).await;

    ledger
        .receive_stock(
            SHOP,
            ACTOR,
            &flour.id,
            StockReceipt {
                quantity: 10,
                unit_cost_cents: Some(190),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let first = ledger
        .create_sale(SHOP, ACTOR, cash_sale(&[(&flour.id, 7)]))
        .await
        .unwrap();
    ledger
        .create_sale(SHOP, ACTOR, credit_sale(&customer.id, &[(&flour.id, 4)]))
        .await
        .unwrap();
    ledger
        .update_product(
            SHOP,
            ACTOR,
            &flour.id,
            ProductUpdate {
                stock_quantity: Some(17),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    ledger.cancel_sale(SHOP, &first.sale.id, ACTOR).await.unwrap();

    // 20 + 10 - 7 - 4 → 19, counted 17, +7 back
    assert_eq!(stock_of(&ledger, &flour.id).await, 24);
    assert_replays(&ledger, &flour.id).await;

    let adjustments = ledger
        .get_stock_history(
            SHOP,
            &MovementFilter {
                product_id: Some(flour.id.clone()),
                action: Some(StockAction::Adjustment),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(adjustments.len(), 2);
    assert_eq!(adjustments[1].notes.as_deref(), Some("Stock count adjustment"));
    assert_eq!(adjustments[1].delta(), -2);
}

#[tokio::test]
async fn test_history_is_scoped_and_limited() {
    let config = LedgerConfig {
        stock_history_limit: 3,
        ..LedgerConfig::default()
    };
    let ledger = ledger_with(config).await;
    let soda = product(&ledger, "Soda", 150, 50).await;
    let water = product(&ledger, "Water", 100, 50).await;

    for _ in 0..4 {
        ledger
            .create_sale(SHOP, ACTOR, cash_sale(&[(&soda.id, 1), (&water.id, 1)]))
            .await
            .unwrap();
    }

    let all = ledger
        .get_stock_history(SHOP, &MovementFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let soda_only = ledger
        .get_stock_history(
            SHOP,
            &MovementFilter {
                product_id: Some(soda.id.clone()),
                limit: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(soda_only.len(), 5);
    assert!(soda_only.iter().all(|m| m.product_id == soda.id));

    let elsewhere = ledger
        .get_stock_history(OTHER_SHOP, &MovementFilter::default())
        .await
        .unwrap();
    assert!(elsewhere.is_empty());
}

#[tokio::test]
async fn test_product_listing() {
    let ledger = ledger().await;
    let soda = product(&ledger, "Soda", 150, 3).await;
    product(&ledger, "Sugar", 320, 40).await;
    let soap = product(&ledger, "Soap", 130, 10).await;
    ledger.delete_product(SHOP, &soap.id).await.unwrap();

    let active = ledger.get_products(SHOP, &ProductFilter::default()).await.unwrap();
    assert_eq!(active.len(), 2);

    let everything = ledger
        .get_products(
            SHOP,
            &ProductFilter {
                include_inactive: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);

    let searched = ledger
        .get_products(
            SHOP,
            &ProductFilter {
                search: Some("so".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, soda.id);

    let check = ledger.check_duplicate(SHOP, None, Some("sug")).await.unwrap();
    assert!(check.barcode_match.is_none());
    assert_eq!(check.similar_names.len(), 1);
    assert!(ledger
        .check_duplicate(OTHER_SHOP, None, Some("sug"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let ledger = ledger().await;
    product(&ledger, "Rice", 1_450, 5).await;
    product(&ledger, "Sugar", 320, 5).await;
    let promo = product(&ledger, "Soap 50% extra", 130, 5).await;

    let check = ledger.check_duplicate(SHOP, None, Some("%")).await.unwrap();
    assert_eq!(check.similar_names.len(), 1);
    assert_eq!(check.similar_names[0].id, promo.id);

    let check = ledger.check_duplicate(SHOP, None, Some("_")).await.unwrap();
    assert!(check.is_empty());

    let searched = ledger
        .get_products(
            SHOP,
            &ProductFilter {
                search: Some("50%".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, promo.id);
}

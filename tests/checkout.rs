//! Integration tests for checkout hand-off through a file-backed store.

use jiff::{Timestamp, tz::TimeZone};
use rand::{SeedableRng, rngs::StdRng};
use rust_decimal::dec;
use testresult::TestResult;

use tally::prelude::*;

fn catalog() -> Result<ProductCatalog, CatalogError> {
    ProductCatalog::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/products.json"))
}

#[test]
fn empty_cart_fails_with_empty_cart() -> TestResult {
    let store = StorefrontConfig::default().open_store(MemoryStorage::new())?;

    let result = StorefrontConfig::default()
        .checkout_assembler()
        .assemble(&store);

    assert!(matches!(result, Err(CheckoutError::EmptyCart)));

    Ok(())
}

#[test]
fn hand_off_records_order_and_clears_cart() -> TestResult {
    let dir = tempfile::tempdir()?;
    let storage = FileStorage::new(dir.path().join("store.json"));
    let config = StorefrontConfig::from_yaml_str("clear_cart_on_checkout: true")?;
    let catalog = catalog()?;

    let mut store = config.open_store(storage.clone())?;

    store.add_from_catalog(&catalog, ProductId::new(4), 1)?;
    store.apply_coupon("SAVE10")?;

    let mut sink = StorageOrderSink::new(storage.clone());
    let order = config.checkout_assembler().hand_off(&mut store, &mut sink)?;

    assert!(store.cart().is_empty());
    assert_eq!(order.items().len(), 1);
    assert_eq!(*order.pricing().total().amount(), dec!(3110));

    let reopened = config.open_store(storage.clone())?;

    assert!(reopened.cart().is_empty());

    let history = StorageOrderSink::new(storage).orders()?;

    assert_eq!(history, vec![order.to_record()]);
    assert_eq!(history.first().and_then(|r| r.coupon_code.as_deref()), Some("SAVE10"));

    Ok(())
}

#[test]
fn default_config_leaves_cart_after_hand_off() -> TestResult {
    let config = StorefrontConfig::default();
    let catalog = catalog()?;
    let mut store = config.open_store(MemoryStorage::new())?;
    let mut orders: Vec<OrderSnapshot> = Vec::new();

    store.add_from_catalog(&catalog, ProductId::new(3), 2)?;
    config.checkout_assembler().hand_off(&mut store, &mut orders)?;

    assert_eq!(orders.len(), 1);
    assert_eq!(store.item_count(), 2);

    Ok(())
}

#[test]
fn delivery_estimate_is_three_to_seven_days_out() -> TestResult {
    let catalog = catalog()?;
    let config = StorefrontConfig::default();
    let mut store = config.open_store(MemoryStorage::new())?;
    let assembler = config.checkout_assembler();

    store.add_from_catalog(&catalog, ProductId::new(1), 1)?;

    let now: Timestamp = "2024-12-29T12:00:00Z".parse()?;
    let today = now.to_zoned(TimeZone::UTC).date();
    let mut seen = [false; 5];

    for seed in 0..200 {
        let mut rng = StdRng::seed_from_u64(seed);
        let order = assembler.assemble_at(&store, now, &mut rng)?;
        let days = (order.estimated_delivery() - today).get_days();

        assert!((3..=7).contains(&days), "estimated {days} days out");

        if let Some(slot) = usize::try_from(days - 3).ok().and_then(|i| seen.get_mut(i)) {
            *slot = true;
        }
    }

    assert!(seen.iter().all(|hit| *hit), "every day in the window is reachable");

    Ok(())
}

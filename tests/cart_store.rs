//! Integration tests for the cart store against the bundled demo catalog.
//!
//! Covers the pricing scenarios shoppers see at checkout, persistence through
//! the file store, and carts written by older storefront builds.

use rust_decimal::{Decimal, dec};
use testresult::TestResult;

use tally::prelude::*;

fn catalog() -> Result<ProductCatalog, CatalogError> {
    ProductCatalog::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/products.json"))
}

fn memory_store() -> CartStore<MemoryStorage> {
    CartStore::new(
        MemoryStorage::new(),
        PricingRules::default(),
        CouponRegistry::default(),
    )
}

fn amount(money: rusty_money::Money<'_, rusty_money::iso::Currency>) -> Decimal {
    *money.amount()
}

#[test]
fn item_count_is_sum_of_quantities() -> TestResult {
    let catalog = catalog()?;
    let mut store = memory_store();

    store.add_from_catalog(&catalog, ProductId::new(1), 2)?;
    store.add_from_catalog(&catalog, ProductId::new(3), 5)?;
    store.add_from_catalog(&catalog, ProductId::new(1), 1)?;

    let sum: u64 = store
        .cart()
        .items()
        .iter()
        .map(|item| u64::from(item.quantity().get()))
        .sum();

    assert_eq!(store.item_count(), 8);
    assert_eq!(store.item_count(), sum);
    assert_eq!(store.cart().len(), 2);

    Ok(())
}

#[test]
fn unknown_product_leaves_cart_unchanged() -> TestResult {
    let catalog = catalog()?;
    let mut store = memory_store();

    store.add_from_catalog(&catalog, ProductId::new(1), 1)?;

    let before = store.cart().clone();
    let result = store.add_from_catalog(&catalog, ProductId::new(404), 1);

    assert!(matches!(result, Err(CartError::ProductNotFound(id)) if id == ProductId::new(404)));
    assert_eq!(store.cart(), &before);

    Ok(())
}

#[test]
fn set_quantity_zero_equals_remove() -> TestResult {
    let catalog = catalog()?;
    let mut by_quantity = memory_store();
    let mut by_remove = memory_store();

    for store in [&mut by_quantity, &mut by_remove] {
        store.add_from_catalog(&catalog, ProductId::new(2), 3)?;
        store.add_from_catalog(&catalog, ProductId::new(4), 1)?;
    }

    by_quantity.set_quantity(ProductId::new(2), 0)?;
    by_remove.remove_item(ProductId::new(2))?;

    assert_eq!(by_quantity.cart(), by_remove.cart());

    Ok(())
}

#[test]
fn quantities_clamp_to_ninety_nine() -> TestResult {
    let catalog = catalog()?;
    let mut store = memory_store();

    store.add_from_catalog(&catalog, ProductId::new(3), 1)?;
    store.set_quantity(ProductId::new(3), 150)?;

    assert_eq!(store.item_count(), 99);

    store.change_quantity(ProductId::new(3), 10)?;

    assert_eq!(store.item_count(), 99);

    Ok(())
}

#[test]
fn checkout_totals_for_each_coupon() -> TestResult {
    let lamp = Product {
        id: ProductId::new(10),
        name: "Lamp".to_string(),
        price: dec!(1000),
        image: String::new(),
        category: "home".to_string(),
        brand: None,
    };

    let cases = [
        (None, DeliveryZone::Local, dec!(70), dec!(0), dec!(2170)),
        (Some("SAVE10"), DeliveryZone::Local, dec!(70), dec!(200), dec!(1970)),
        (Some("save50"), DeliveryZone::Remote, dec!(120), dec!(50), dec!(2170)),
        (Some("FREESHIP"), DeliveryZone::Remote, dec!(0), dec!(0), dec!(2100)),
        (Some("welcome"), DeliveryZone::Local, dec!(70), dec!(300), dec!(1870)),
    ];

    for (coupon, zone, shipping, discount, total) in cases {
        let mut store = memory_store();

        store.add_item(&lamp, 2)?;
        store.set_delivery_zone(zone)?;

        if let Some(code) = coupon {
            store.apply_coupon(code)?;
        }

        let breakdown = store.price()?;

        assert_eq!(amount(breakdown.subtotal()), dec!(2000), "{coupon:?}");
        assert_eq!(amount(breakdown.tax()), dec!(100), "{coupon:?}");
        assert_eq!(amount(breakdown.shipping()), shipping, "{coupon:?}");
        assert_eq!(amount(breakdown.discount()), discount, "{coupon:?}");
        assert_eq!(amount(breakdown.total()), total, "{coupon:?}");
    }

    Ok(())
}

#[test]
fn file_store_round_trips_between_sessions() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cart.json");
    let catalog = catalog()?;
    let config = StorefrontConfig::default();

    let mut first = config.open_store(FileStorage::new(&path))?;

    first.add_from_catalog(&catalog, ProductId::new(5), 4)?;
    first.add_from_catalog(&catalog, ProductId::new(2), 1)?;
    first.set_delivery_zone(DeliveryZone::Remote)?;

    let second = config.open_store(FileStorage::new(&path))?;

    assert_eq!(second.cart().items(), first.cart().items());
    assert_eq!(second.cart().zone(), DeliveryZone::Remote);
    assert_eq!(amount(second.price()?.subtotal()), dec!(2332));

    Ok(())
}

#[test]
fn corrupt_store_file_is_replaced_on_next_change() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cart.json");
    let catalog = catalog()?;
    let config = StorefrontConfig::default();

    std::fs::write(&path, "not json")?;

    let mut store = config.open_store(FileStorage::new(&path))?;

    assert!(store.cart().is_empty());

    store.add_from_catalog(&catalog, ProductId::new(3), 2)?;
    store.set_delivery_zone(DeliveryZone::Remote)?;

    let reopened = config.open_store(FileStorage::new(&path))?;

    assert_eq!(reopened.item_count(), 2);
    assert_eq!(reopened.cart().zone(), DeliveryZone::Remote);

    Ok(())
}

#[test]
fn loads_cart_written_by_older_storefront() -> TestResult {
    let storage = MemoryStorage::new();

    storage.set(
        "cart",
        r#"[{"id":1,"name":"Wireless Headphones","price":2499,"image":"images/headphones.jpg","quantity":1},
            {"id":3,"name":"Ceramic Mug Set","price":650,"image":"images/mugs.jpg","category":"home","quantity":3}]"#,
    )?;
    storage.set("deliveryLocation", "dhaka")?;

    let store = StorefrontConfig::default().open_store(storage)?;

    assert_eq!(store.item_count(), 4);
    assert_eq!(store.cart().zone(), DeliveryZone::Local);
    assert_eq!(
        store.cart().get(ProductId::new(1)).map(LineItem::category),
        Some("")
    );
    assert_eq!(amount(store.price()?.total()), dec!(4741));

    Ok(())
}

#[test]
fn observer_sees_every_persisted_change() -> TestResult {
    #[derive(Debug, Default)]
    struct Log(Vec<CartEvent>);

    impl CartObserver for Log {
        fn on_cart_changed(&mut self, event: &CartEvent, _cart: &Cart) {
            self.0.push(event.clone());
        }
    }

    let catalog = catalog()?;
    let mut store = CartStore::open(
        MemoryStorage::new(),
        PricingRules::default(),
        CouponRegistry::default(),
        Log::default(),
    );

    store.add_from_catalog(&catalog, ProductId::new(1), 1)?;
    store.change_quantity(ProductId::new(1), 1)?;
    store.set_delivery_zone(DeliveryZone::Remote)?;
    store.apply_coupon("FREESHIP")?;
    store.remove_coupon();
    store.clear()?;

    assert_eq!(
        store.observer().0,
        vec![
            CartEvent::Loaded,
            CartEvent::ItemAdded {
                product_id: ProductId::new(1),
                quantity: Quantity::try_from(1)?,
            },
            CartEvent::QuantityChanged {
                product_id: ProductId::new(1),
                quantity: Quantity::try_from(2)?,
            },
            CartEvent::DeliveryZoneChanged(DeliveryZone::Remote),
            CartEvent::CouponApplied("FREESHIP".to_string()),
            CartEvent::CouponRemoved,
            CartEvent::Cleared,
        ]
    );

    Ok(())
}

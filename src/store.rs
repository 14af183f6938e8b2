//! Cart Store
//!
//! [`CartStore`] owns a [`Cart`] and is its only writer. Every mutation that
//! changes the cart is persisted through a [`Storage`] backend and then
//! reported to a [`CartObserver`]. Calls that change nothing do neither.
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use tally::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = MemoryStorage::new();
//! let catalog = ProductCatalog::from_json_str(
//!     r#"{ "products": [{ "id": 1, "name": "Lamp", "price": 1000, "image": "lamp.jpg", "category": "home" }] }"#,
//! )?;
//!
//! let mut store = CartStore::new(storage, PricingRules::default(), CouponRegistry::default());
//!
//! store.add_from_catalog(&catalog, ProductId::new(1), 2)?;
//! store.apply_coupon("save10")?;
//!
//! let breakdown = store.price()?;
//!
//! assert_eq!(store.item_count(), 2);
//! assert_eq!(*breakdown.total().amount(), Decimal::from(1970));
//! # Ok(())
//! # }
//! ```

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cart::{Cart, QuantityChange},
    coupons::CouponRegistry,
    delivery::DeliveryZone,
    items::{LineItem, ProductId, Quantity},
    pricing::{PriceBreakdown, PricingError, PricingRules},
    products::{Catalog, Product},
    storage::{CART_KEY, DELIVERY_ZONE_KEY, Storage, StorageError},
};

/// Errors raised by cart store operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The coupon code is not in the store's registry.
    #[error("invalid coupon code: {0}")]
    CouponInvalid(String),

    /// The catalog has no product with this id.
    #[error("product {0} not found in catalog")]
    ProductNotFound(ProductId),

    /// The cart could not be written to storage.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The cart could not be encoded for storage.
    #[error("failed to encode cart: {0}")]
    Encode(#[from] serde_json::Error),

    /// The cart could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Change reported to a [`CartObserver`] after it has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// The cart was rehydrated from storage.
    Loaded,

    /// A product was added, or merged into its existing line.
    ItemAdded {
        /// Product added
        product_id: ProductId,
        /// Line quantity after the add
        quantity: Quantity,
    },

    /// A line was removed.
    ItemRemoved {
        /// Product removed
        product_id: ProductId,
    },

    /// A line's quantity was set to a new value.
    QuantityChanged {
        /// Product updated
        product_id: ProductId,
        /// New line quantity
        quantity: Quantity,
    },

    /// Every line was removed.
    Cleared,

    /// A different delivery zone was selected.
    DeliveryZoneChanged(DeliveryZone),

    /// A coupon was activated (upper-cased code).
    CouponApplied(String),

    /// The active coupon was removed.
    CouponRemoved,
}

/// Receives cart change notifications, typically to re-render a view.
pub trait CartObserver {
    /// Called after each persisted change, with the cart's new state.
    fn on_cart_changed(&mut self, event: &CartEvent, cart: &Cart);
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopObserver;

impl CartObserver for NoopObserver {
    fn on_cart_changed(&mut self, _event: &CartEvent, _cart: &Cart) {}
}

/// Cart line as older and current storefront builds persisted it.
///
/// Quantity is signed so that out-of-range values can be detected and dropped.
#[derive(Debug, Deserialize)]
struct StoredLineItem {
    id: ProductId,
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    #[serde(default)]
    image: String,
    #[serde(default)]
    category: String,
    quantity: i64,
}

impl StoredLineItem {
    fn into_line_item(self) -> Option<LineItem> {
        if self.price < Decimal::ZERO {
            warn!(
                product_id = %self.id,
                price = %self.price,
                "discarding stored line with negative price"
            );

            return None;
        }

        let Some(quantity) = Quantity::clamped(self.quantity) else {
            warn!(
                product_id = %self.id,
                quantity = self.quantity,
                "discarding stored line with non-positive quantity"
            );

            return None;
        };

        if i64::from(quantity.get()) < self.quantity {
            debug!(product_id = %self.id, stored = self.quantity, "clamped stored quantity");
        }

        Some(LineItem::new(
            self.id,
            self.name,
            self.price,
            self.image,
            self.category,
            quantity,
        ))
    }
}

/// Persistent, observable cart.
#[derive(Debug)]
pub struct CartStore<S: Storage, O: CartObserver = NoopObserver> {
    cart: Cart,
    storage: S,
    rules: PricingRules,
    coupons: CouponRegistry,
    observer: O,
}

impl<S: Storage> CartStore<S> {
    /// Creates an empty store without an observer.
    ///
    /// Nothing is read from `storage` until [`CartStore::load`] is called.
    pub fn new(storage: S, rules: PricingRules, coupons: CouponRegistry) -> Self {
        Self::with_observer(storage, rules, coupons, NoopObserver)
    }
}

impl<S: Storage, O: CartObserver> CartStore<S, O> {
    /// Creates an empty store that reports changes to `observer`.
    pub fn with_observer(
        storage: S,
        rules: PricingRules,
        coupons: CouponRegistry,
        observer: O,
    ) -> Self {
        Self {
            cart: Cart::new(),
            storage,
            rules,
            coupons,
            observer,
        }
    }

    /// Creates a store and rehydrates it from `storage`.
    pub fn open(storage: S, rules: PricingRules, coupons: CouponRegistry, observer: O) -> Self {
        let mut store = Self::with_observer(storage, rules, coupons, observer);

        store.load();

        store
    }

    /// Current cart state.
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Pricing rules used by [`CartStore::price`].
    pub fn rules(&self) -> &PricingRules {
        &self.rules
    }

    /// Coupons this store accepts.
    pub fn coupons(&self) -> &CouponRegistry {
        &self.coupons
    }

    /// Observer receiving change notifications.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Sum of quantities over all lines.
    pub fn item_count(&self) -> u64 {
        self.cart.item_count()
    }

    /// Prices the current cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Pricing`] if an amount overflows.
    pub fn price(&self) -> Result<PriceBreakdown<'static>, CartError> {
        Ok(self
            .rules
            .price(self.cart.items(), self.cart.zone(), self.cart.coupon())?)
    }

    /// Replaces the in-memory items and zone with what storage holds.
    ///
    /// Absent or unreadable data counts as an empty cart in the local zone.
    /// Stored lines with a non-positive quantity or negative price are dropped,
    /// quantities above the ceiling are clamped and duplicate products merged.
    /// The active coupon is kept.
    pub fn load(&mut self) {
        let items = self.read_items();
        let zone = self.read_zone();

        self.cart.replace_items(Cart::with_items(items));
        self.cart.set_zone(zone);

        debug!(
            lines = self.cart.len(),
            items = self.cart.item_count(),
            zone = %self.cart.zone(),
            "loaded cart"
        );

        self.notify(&CartEvent::Loaded);
    }

    /// Writes the items and zone to storage.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if encoding or the storage write fails.
    pub fn save(&self) -> Result<(), CartError> {
        self.persist_items()?;
        self.persist_zone()
    }

    /// Adds `quantity` units of a product, merging into its existing line.
    ///
    /// The line quantity never exceeds 99; excess units are dropped. Adding
    /// zero units does nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the cart cannot be persisted.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        let Some(requested) = Quantity::clamped(i64::from(quantity)) else {
            return Ok(());
        };

        let before = self
            .cart
            .get(product.id)
            .map_or(0, |item| item.quantity().get());

        let after = self.cart.add(LineItem::from_product(product, requested));

        if before.saturating_add(quantity) > after.get() {
            debug!(
                product_id = %product.id,
                requested = quantity,
                quantity = %after,
                "clamped line quantity"
            );
        }

        if after.get() == before {
            return Ok(());
        }

        debug!(product_id = %product.id, quantity = %after, "added item to cart");

        self.persist_items()?;
        self.notify(&CartEvent::ItemAdded {
            product_id: product.id,
            quantity: after,
        });

        Ok(())
    }

    /// Looks a product up in `catalog` and adds it.
    ///
    /// # Errors
    ///
    /// - [`CartError::ProductNotFound`]: the catalog has no such product. The cart is unchanged.
    /// - [`CartError::Storage`]: the cart could not be persisted.
    pub fn add_from_catalog<C: Catalog + ?Sized>(
        &mut self,
        catalog: &C,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        let product = catalog
            .product(product_id)
            .ok_or(CartError::ProductNotFound(product_id))?;

        self.add_item(product, quantity)
    }

    /// Removes a product's line. Unknown products are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the cart cannot be persisted.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), CartError> {
        if self.cart.remove(product_id).is_none() {
            return Ok(());
        }

        debug!(%product_id, "removed item from cart");

        self.persist_items()?;
        self.notify(&CartEvent::ItemRemoved { product_id });

        Ok(())
    }

    /// Sets a line's quantity; zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the cart cannot be persisted.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> Result<(), CartError> {
        let before = self.cart.get(product_id).map(LineItem::quantity);
        let change = self.cart.set_quantity(product_id, quantity);

        self.apply_quantity_change(product_id, before, quantity, change)
    }

    /// Adjusts a line's quantity by `delta`; dropping to zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the cart cannot be persisted.
    pub fn change_quantity(&mut self, product_id: ProductId, delta: i64) -> Result<(), CartError> {
        let before = self.cart.get(product_id).map(LineItem::quantity);
        let requested = before.map_or(delta, |q| i64::from(q.get()).saturating_add(delta));
        let change = self.cart.change_quantity(product_id, delta);

        self.apply_quantity_change(product_id, before, requested, change)
    }

    /// Removes every line.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the cart cannot be persisted.
    pub fn clear(&mut self) -> Result<(), CartError> {
        if !self.cart.clear() {
            return Ok(());
        }

        debug!("cleared cart");

        self.persist_items()?;
        self.notify(&CartEvent::Cleared);

        Ok(())
    }

    /// Selects the delivery zone.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the zone cannot be persisted.
    pub fn set_delivery_zone(&mut self, zone: DeliveryZone) -> Result<(), CartError> {
        if !self.cart.set_zone(zone) {
            return Ok(());
        }

        debug!(%zone, "changed delivery zone");

        self.persist_zone()?;
        self.notify(&CartEvent::DeliveryZoneChanged(zone));

        Ok(())
    }

    /// Activates a coupon by code, replacing any active coupon.
    ///
    /// Coupons are held in memory only.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::CouponInvalid`] if the code is unknown; the active
    /// coupon is left as it was.
    pub fn apply_coupon(&mut self, code: &str) -> Result<(), CartError> {
        let coupon = self
            .coupons
            .resolve(code)
            .map_err(|_err| CartError::CouponInvalid(code.to_string()))?;

        if self.cart.coupon() == Some(coupon) {
            return Ok(());
        }

        let code = coupon.code().to_string();

        self.cart.set_coupon(coupon.clone());

        info!(coupon = %code, "applied coupon");

        self.notify(&CartEvent::CouponApplied(code));

        Ok(())
    }

    /// Deactivates the active coupon, if any.
    pub fn remove_coupon(&mut self) {
        if let Some(coupon) = self.cart.take_coupon() {
            debug!(coupon = coupon.code(), "removed coupon");

            self.notify(&CartEvent::CouponRemoved);
        }
    }

    fn apply_quantity_change(
        &mut self,
        product_id: ProductId,
        before: Option<Quantity>,
        requested: i64,
        change: QuantityChange,
    ) -> Result<(), CartError> {
        let event = match change {
            QuantityChange::Absent => return Ok(()),
            QuantityChange::Removed => {
                debug!(%product_id, "removed item from cart");

                CartEvent::ItemRemoved { product_id }
            }
            QuantityChange::Updated(quantity) => {
                if i64::from(quantity.get()) < requested {
                    debug!(%product_id, requested, quantity = %quantity, "clamped line quantity");
                }

                if before == Some(quantity) {
                    return Ok(());
                }

                debug!(%product_id, quantity = %quantity, "changed item quantity");

                CartEvent::QuantityChanged {
                    product_id,
                    quantity,
                }
            }
        };

        self.persist_items()?;
        self.notify(&event);

        Ok(())
    }

    fn notify(&mut self, event: &CartEvent) {
        self.observer.on_cart_changed(event, &self.cart);
    }

    fn persist_items(&self) -> Result<(), CartError> {
        let encoded = serde_json::to_string(self.cart.items())?;

        self.storage.set(CART_KEY, &encoded)?;

        Ok(())
    }

    fn persist_zone(&self) -> Result<(), CartError> {
        let encoded = serde_json::to_string(&self.cart.zone())?;

        self.storage.set(DELIVERY_ZONE_KEY, &encoded)?;

        Ok(())
    }

    fn read_items(&self) -> Vec<LineItem> {
        let raw = match self.storage.get(CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(error) => {
                warn!(%error, "failed to read stored cart, starting empty");

                return Vec::new();
            }
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%error, "discarding malformed stored cart");

                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<StoredLineItem>(entry) {
                Ok(stored) => stored.into_line_item(),
                Err(error) => {
                    warn!(%error, "discarding malformed stored line");

                    None
                }
            })
            .collect()
    }

    fn read_zone(&self) -> DeliveryZone {
        let raw = match self.storage.get(DELIVERY_ZONE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return DeliveryZone::default(),
            Err(error) => {
                warn!(%error, "failed to read stored delivery zone, using default");

                return DeliveryZone::default();
            }
        };

        // Some builds stored the bare zone name rather than a JSON string.
        serde_json::from_str::<DeliveryZone>(&raw)
            .ok()
            .or_else(|| raw.parse().ok())
            .unwrap_or_else(|| {
                warn!(stored = %raw, "discarding unknown stored delivery zone");

                DeliveryZone::default()
            })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use testresult::TestResult;

    use crate::{coupons::Coupon, storage::MemoryStorage};

    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        events: Vec<CartEvent>,
        counts: Vec<u64>,
    }

    impl CartObserver for Recorder {
        fn on_cart_changed(&mut self, event: &CartEvent, cart: &Cart) {
            self.events.push(event.clone());
            self.counts.push(cart.item_count());
        }
    }

    fn product(id: u64, price: Decimal) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price,
            image: format!("{id}.jpg"),
            category: "misc".to_string(),
            brand: None,
        }
    }

    fn store() -> CartStore<MemoryStorage, Recorder> {
        CartStore::with_observer(
            MemoryStorage::new(),
            PricingRules::default(),
            CouponRegistry::default(),
            Recorder::default(),
        )
    }

    #[test]
    fn mutations_persist_then_notify() -> TestResult {
        let mut store = store();

        store.add_item(&product(1, dec!(1000)), 2)?;

        assert_eq!(
            store.observer().events,
            vec![CartEvent::ItemAdded {
                product_id: ProductId::new(1),
                quantity: Quantity::clamped(2).unwrap_or(Quantity::ONE),
            }]
        );
        assert_eq!(store.observer().counts, vec![2]);
        assert!(store.storage().get(CART_KEY)?.is_some());

        Ok(())
    }

    #[test]
    fn noop_calls_neither_persist_nor_notify() -> TestResult {
        let mut store = store();

        store.add_item(&product(1, dec!(10)), 0)?;
        store.remove_item(ProductId::new(1))?;
        store.set_quantity(ProductId::new(1), 4)?;
        store.change_quantity(ProductId::new(1), 1)?;
        store.clear()?;
        store.set_delivery_zone(DeliveryZone::Local)?;
        store.remove_coupon();

        assert!(store.observer().events.is_empty());
        assert!(store.storage().is_empty());

        Ok(())
    }

    #[test]
    fn adding_at_the_ceiling_is_a_noop() -> TestResult {
        let mut store = store();
        let lamp = product(1, dec!(10));

        store.add_item(&lamp, 150)?;
        store.add_item(&lamp, 1)?;

        assert_eq!(store.item_count(), 99);
        assert_eq!(store.observer().events.len(), 1);

        Ok(())
    }

    #[test]
    fn set_quantity_to_same_value_is_a_noop() -> TestResult {
        let mut store = store();

        store.add_item(&product(1, dec!(10)), 3)?;
        store.set_quantity(ProductId::new(1), 3)?;

        assert_eq!(store.observer().events.len(), 1);

        Ok(())
    }

    #[test]
    fn set_quantity_zero_emits_removal() -> TestResult {
        let mut store = store();

        store.add_item(&product(1, dec!(10)), 3)?;
        store.set_quantity(ProductId::new(1), 0)?;

        assert_eq!(
            store.observer().events.last(),
            Some(&CartEvent::ItemRemoved {
                product_id: ProductId::new(1)
            })
        );
        assert_eq!(store.storage().get(CART_KEY)?, Some("[]".to_string()));

        Ok(())
    }

    #[test]
    fn invalid_coupon_keeps_active_coupon() -> TestResult {
        let mut store = store();

        store.apply_coupon("save10")?;

        let result = store.apply_coupon("BOGUS");

        assert!(matches!(result, Err(CartError::CouponInvalid(code)) if code == "BOGUS"));
        assert_eq!(store.cart().coupon().map(Coupon::code), Some("SAVE10"));
        assert_eq!(
            store.observer().events,
            vec![CartEvent::CouponApplied("SAVE10".to_string())]
        );

        Ok(())
    }

    #[test]
    fn coupons_are_not_persisted() -> TestResult {
        let mut store = store();

        store.apply_coupon("FREESHIP")?;

        assert!(store.storage().is_empty());

        store.remove_coupon();

        assert_eq!(store.observer().events.last(), Some(&CartEvent::CouponRemoved));

        Ok(())
    }

    #[test]
    fn zone_change_persists_zone_only() -> TestResult {
        let mut store = store();

        store.set_delivery_zone(DeliveryZone::Remote)?;

        assert_eq!(
            store.storage().get(DELIVERY_ZONE_KEY)?,
            Some("\"remote\"".to_string())
        );
        assert_eq!(store.storage().get(CART_KEY)?, None);

        Ok(())
    }

    #[test]
    fn price_reflects_zone_and_coupon() -> TestResult {
        let mut store = store();

        store.add_item(&product(1, dec!(1000)), 2)?;
        store.set_delivery_zone(DeliveryZone::Remote)?;
        store.apply_coupon("SAVE50")?;

        let breakdown = store.price()?;

        assert_eq!(*breakdown.shipping().amount(), dec!(120));
        assert_eq!(*breakdown.discount().amount(), dec!(50));
        assert_eq!(*breakdown.total().amount(), dec!(2170));

        Ok(())
    }

    #[test]
    fn load_sanitises_stored_lines() -> TestResult {
        let storage = MemoryStorage::new();

        storage.set(
            CART_KEY,
            r#"[
                {"id": 1, "name": "A", "price": 10, "image": "a.jpg", "quantity": 2},
                {"id": 2, "name": "B", "price": 5, "image": "b.jpg", "quantity": 0},
                {"id": 3, "name": "C", "price": -1, "image": "c.jpg", "quantity": 1},
                {"id": 4, "name": "D", "price": 3, "image": "d.jpg", "quantity": 500},
                {"id": 1, "name": "A", "price": 10, "image": "a.jpg", "quantity": 3},
                {"id": "x", "name": "bad"}
            ]"#,
        )?;
        storage.set(DELIVERY_ZONE_KEY, "outside")?;

        let store = CartStore::open(
            storage,
            PricingRules::default(),
            CouponRegistry::default(),
            Recorder::default(),
        );

        let lines: Vec<(u64, u32)> = store
            .cart()
            .items()
            .iter()
            .map(|item| (item.product_id().get(), item.quantity().get()))
            .collect();

        assert_eq!(lines, vec![(1, 5), (4, 99)]);
        assert_eq!(store.cart().zone(), DeliveryZone::Remote);
        assert_eq!(store.observer().events, vec![CartEvent::Loaded]);

        Ok(())
    }

    #[test]
    fn load_treats_garbage_as_empty() -> TestResult {
        let storage = MemoryStorage::new();

        storage.set(CART_KEY, "{not json")?;
        storage.set(DELIVERY_ZONE_KEY, "\"moon\"")?;

        let store = CartStore::open(
            storage,
            PricingRules::default(),
            CouponRegistry::default(),
            NoopObserver,
        );

        assert!(store.cart().is_empty());
        assert_eq!(store.cart().zone(), DeliveryZone::Local);

        Ok(())
    }

    #[test]
    fn save_then_load_round_trips() -> TestResult {
        let storage = MemoryStorage::new();
        let mut store = CartStore::new(
            storage.clone(),
            PricingRules::default(),
            CouponRegistry::default(),
        );

        store.add_item(&product(1, dec!(12.5)), 3)?;
        store.add_item(&product(2, dec!(1000)), 1)?;
        store.set_delivery_zone(DeliveryZone::Remote)?;
        store.save()?;

        let reloaded = CartStore::open(
            storage,
            PricingRules::default(),
            CouponRegistry::default(),
            NoopObserver,
        );

        assert_eq!(reloaded.cart().items(), store.cart().items());
        assert_eq!(reloaded.cart().zone(), DeliveryZone::Remote);

        Ok(())
    }
}

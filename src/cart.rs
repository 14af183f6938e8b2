//! Cart
//!
//! In-memory cart state. Persistence and change notification live in
//! [`crate::store`]; everything here is plain data manipulation.

use crate::{
    coupons::Coupon,
    delivery::DeliveryZone,
    items::{LineItem, ProductId, Quantity},
};

/// Outcome of a quantity update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuantityChange {
    /// No line exists for the product; nothing changed.
    Absent,

    /// The requested quantity was zero or less, so the line was removed.
    Removed,

    /// The line now holds this quantity.
    Updated(Quantity),
}

/// Line items, delivery zone and active coupon.
///
/// Holds at most one line per product; adding a product that is already
/// present increases that line's quantity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<LineItem>,
    zone: DeliveryZone,
    coupon: Option<Coupon>,
}

impl Cart {
    /// Create an empty cart in the default zone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cart from line items, merging lines that share a product.
    pub fn with_items(items: impl IntoIterator<Item = LineItem>) -> Self {
        let mut cart = Self::new();

        for item in items {
            cart.add(item);
        }

        cart
    }

    /// Line items in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Line for a product, if present.
    pub fn get(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items
            .iter()
            .find(|item| item.product_id() == product_id)
    }

    /// Get the number of distinct lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities over all lines.
    pub fn item_count(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity().get()))
            .sum()
    }

    /// Selected delivery zone.
    pub fn zone(&self) -> DeliveryZone {
        self.zone
    }

    /// Active coupon, if any.
    pub fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Adds a line, merging into an existing line for the same product.
    ///
    /// Merged quantities stop at [`Quantity::MAX`]. Returns the line's resulting quantity.
    pub fn add(&mut self, item: LineItem) -> Quantity {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|existing| existing.product_id() == item.product_id())
        {
            let merged = existing.quantity().saturating_add(item.quantity().get());

            existing.set_quantity(merged);

            return merged;
        }

        let quantity = item.quantity();

        self.items.push(item);

        quantity
    }

    /// Removes the line for a product, returning it if it was present.
    pub fn remove(&mut self, product_id: ProductId) -> Option<LineItem> {
        let idx = self
            .items
            .iter()
            .position(|item| item.product_id() == product_id)?;

        Some(self.items.remove(idx))
    }

    /// Sets a line's quantity, clamped to `1..=99`; zero or less removes the line.
    pub fn set_quantity(&mut self, product_id: ProductId, requested: i64) -> QuantityChange {
        let Some(idx) = self
            .items
            .iter()
            .position(|item| item.product_id() == product_id)
        else {
            return QuantityChange::Absent;
        };

        match Quantity::clamped(requested) {
            Some(quantity) => {
                if let Some(item) = self.items.get_mut(idx) {
                    item.set_quantity(quantity);
                }

                QuantityChange::Updated(quantity)
            }
            None => {
                self.items.remove(idx);

                QuantityChange::Removed
            }
        }
    }

    /// Adjusts a line's quantity by `delta`, with the same rules as [`Cart::set_quantity`].
    pub fn change_quantity(&mut self, product_id: ProductId, delta: i64) -> QuantityChange {
        let Some(current) = self.get(product_id).map(|item| item.quantity().get()) else {
            return QuantityChange::Absent;
        };

        self.set_quantity(product_id, i64::from(current).saturating_add(delta))
    }

    /// Removes every line. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let had_items = !self.items.is_empty();

        self.items.clear();

        had_items
    }

    /// Selects a delivery zone. Returns whether the zone changed.
    pub fn set_zone(&mut self, zone: DeliveryZone) -> bool {
        let changed = self.zone != zone;

        self.zone = zone;

        changed
    }

    /// Activates a coupon, replacing any previous one.
    pub fn set_coupon(&mut self, coupon: Coupon) -> Option<Coupon> {
        self.coupon.replace(coupon)
    }

    /// Deactivates the current coupon.
    pub fn take_coupon(&mut self) -> Option<Coupon> {
        self.coupon.take()
    }

    pub(crate) fn replace_items(&mut self, items: Cart) {
        self.items = items.items;
    }
}

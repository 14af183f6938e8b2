//! Items

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::products::Product;

/// Largest quantity a single line item may hold.
pub const MAX_QUANTITY: u32 = 99;

/// Catalog identifier of a product.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(u64);

impl ProductId {
    /// Wraps a raw catalog id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw catalog id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ProductId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A quantity outside `1..=MAX_QUANTITY` was supplied where a valid one is required.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("quantity {0} is outside 1..=99")]
pub struct QuantityOutOfRange(pub u32);

/// Number of units on a line item, always within `1..=MAX_QUANTITY`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// The per-line ceiling.
    pub const MAX: Self = Self(MAX_QUANTITY);

    /// Clamps a requested quantity into range.
    ///
    /// Returns `None` for zero or negative requests, which callers treat as removal.
    pub fn clamped(requested: i64) -> Option<Self> {
        if requested <= 0 {
            return None;
        }

        let capped = requested.min(i64::from(MAX_QUANTITY));

        u32::try_from(capped).ok().map(Self)
    }

    /// Returns the number of units.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Adds units, stopping at [`Quantity::MAX`].
    #[must_use]
    pub fn saturating_add(self, units: u32) -> Self {
        Self(self.0.saturating_add(units).min(MAX_QUANTITY))
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityOutOfRange;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 || value > MAX_QUANTITY {
            return Err(QuantityOutOfRange(value));
        }

        Ok(Self(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One product entry in the cart.
///
/// Serialises with the field names the storefront has always used in local
/// storage (`id`, `price`, `image`), so carts written by older clients load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "id")]
    product_id: ProductId,

    name: String,

    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    unit_price: Decimal,

    #[serde(rename = "image", default)]
    image_ref: String,

    #[serde(default)]
    category: String,

    quantity: Quantity,
}

impl LineItem {
    /// Creates a line item from its parts.
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Decimal,
        image_ref: impl Into<String>,
        category: impl Into<String>,
        quantity: Quantity,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            unit_price,
            image_ref: image_ref.into(),
            category: category.into(),
            quantity,
        }
    }

    /// Creates a line item for a catalog product.
    pub fn from_product(product: &Product, quantity: Quantity) -> Self {
        Self::new(
            product.id,
            product.name.clone(),
            product.price,
            product.image.clone(),
            product.category.clone(),
            quantity,
        )
    }

    /// Product this line refers to.
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Display name captured when the product was added.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Price of a single unit, in major currency units.
    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Image reference captured when the product was added.
    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    /// Catalog category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Units on this line.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub(crate) fn set_quantity(&mut self, quantity: Quantity) {
        self.quantity = quantity;
    }

    /// Unit price multiplied by quantity, or `None` on decimal overflow.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity.get()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    #[test]
    fn clamped_rejects_non_positive_requests() {
        assert_eq!(Quantity::clamped(0), None);
        assert_eq!(Quantity::clamped(-4), None);
    }

    #[test]
    fn clamped_caps_at_max() {
        assert_eq!(Quantity::clamped(150), Some(Quantity::MAX));
        assert_eq!(Quantity::clamped(i64::MAX), Some(Quantity::MAX));
        assert_eq!(Quantity::clamped(7).map(Quantity::get), Some(7));
    }

    #[test]
    fn saturating_add_stops_at_max() {
        let quantity = Quantity::MAX.saturating_add(1);

        assert_eq!(quantity, Quantity::MAX);
        assert_eq!(Quantity::ONE.saturating_add(2).get(), 3);
        assert_eq!(Quantity::ONE.saturating_add(u32::MAX), Quantity::MAX);
    }

    #[test]
    fn quantity_deserialisation_rejects_out_of_range() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert!(serde_json::from_str::<Quantity>("100").is_err());
        assert!(matches!(serde_json::from_str::<Quantity>("99"), Ok(q) if q == Quantity::MAX));
    }

    #[test]
    fn line_total_multiplies_price_by_quantity() {
        let item = LineItem::new(
            ProductId::new(1),
            "Kettle",
            dec!(12.50),
            "kettle.jpg",
            "home",
            Quantity::clamped(3).unwrap_or(Quantity::ONE),
        );

        assert_eq!(item.line_total(), Some(dec!(37.50)));
    }

    #[test]
    fn serialises_with_storefront_field_names() -> testresult::TestResult {
        let item = LineItem::new(
            ProductId::new(4),
            "Lamp",
            dec!(1000),
            "lamp.jpg",
            "home",
            Quantity::ONE,
        );

        let json = serde_json::to_value(&item)?;

        assert_eq!(json["id"], 4);
        assert_eq!(json["price"], 1000.0);
        assert_eq!(json["image"], "lamp.jpg");
        assert_eq!(json["quantity"], 1);

        Ok(())
    }
}

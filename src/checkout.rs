//! Checkout
//!
//! Freezes a cart and its pricing into an [`OrderSnapshot`] and hands it to
//! an [`OrderSink`].

use std::io;

use jiff::{Timestamp, ToSpan, civil::Date, tz::TimeZone};
use rand::Rng;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    delivery::{DeliveryWindow, DeliveryZone},
    items::LineItem,
    pricing::{PriceBreakdown, PricingError, to_money},
    storage::{CHECKOUT_KEY, ORDERS_KEY, Storage, StorageError},
    store::{CartError, CartObserver, CartStore},
};

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was requested for a cart with no lines.
    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// The cart could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The cart could not be cleared after hand-off.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The delivery date fell outside the supported calendar range.
    #[error("failed to compute delivery date: {0}")]
    Date(#[from] jiff::Error),

    /// The order could not be encoded.
    #[error("failed to encode order: {0}")]
    Encode(#[from] serde_json::Error),

    /// The order could not be written to storage.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The summary could not be written.
    #[error("failed to write order summary")]
    IO,
}

/// Whether the cart is emptied once an order has been handed off.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ClearPolicy {
    /// Clear the cart after the sink accepts the order.
    AfterHandOff,

    /// Leave the cart untouched; the caller decides when to clear it.
    #[default]
    Keep,
}

/// Immutable record of a cart and its pricing at checkout time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    items: Vec<LineItem>,
    pricing: PriceBreakdown<'static>,
    coupon_code: Option<String>,
    zone: DeliveryZone,
    estimated_delivery: Date,
    created_at: Timestamp,
}

impl OrderSnapshot {
    /// Line items at checkout.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Price breakdown at checkout.
    pub fn pricing(&self) -> &PriceBreakdown<'static> {
        &self.pricing
    }

    /// Code of the coupon that was active, if any.
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    /// Delivery zone at checkout.
    pub fn zone(&self) -> DeliveryZone {
        self.zone
    }

    /// Estimated delivery date (UTC calendar).
    pub fn estimated_delivery(&self) -> Date {
        self.estimated_delivery
    }

    /// When the snapshot was taken.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Order id, derived from the creation time in milliseconds.
    pub fn order_id(&self) -> i64 {
        self.created_at.as_millisecond()
    }

    /// JSON-ready form of the snapshot, using the storefront's field names.
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.order_id(),
            items: self.items.clone(),
            subtotal: *self.pricing.subtotal().amount(),
            shipping: *self.pricing.shipping().amount(),
            tax: *self.pricing.tax().amount(),
            discount: *self.pricing.discount().amount(),
            total: *self.pricing.total().amount(),
            currency: self.pricing.total().currency().iso_alpha_code.to_string(),
            coupon_code: self.coupon_code.clone(),
            delivery_location: self.zone,
            estimated_delivery: self.estimated_delivery,
            order_date: self.created_at,
        }
    }

    /// Prints an order summary table.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::IO`] if the summary cannot be written, or
    /// [`CheckoutError::Pricing`] if a line total cannot be converted.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), CheckoutError> {
        let currency = self.pricing.total().currency();
        let mut builder = Builder::default();

        builder.push_record(["Item", "Qty", "Unit Price", "Line Total"]);

        for item in &self.items {
            let line_total = item.line_total().ok_or(PricingError::Overflow)?;

            builder.push_record([
                item.name().to_string(),
                item.quantity().to_string(),
                to_money(item.unit_price(), currency)?.to_string(),
                to_money(line_total, currency)?.to_string(),
            ]);
        }

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Columns::new(1..4), Alignment::right());

        writeln!(out, "\n{table}").map_err(|_err| CheckoutError::IO)?;

        let shipping_label = format!("Shipping ({}):", self.zone.label());
        let discount_label = match &self.coupon_code {
            Some(code) => format!("Discount ({code}):"),
            None => "Discount:".to_string(),
        };

        let lines = [
            ("Subtotal:", self.pricing.subtotal()),
            (shipping_label.as_str(), self.pricing.shipping()),
            ("Tax:", self.pricing.tax()),
            (discount_label.as_str(), self.pricing.discount()),
            ("Total:", self.pricing.display_total()),
        ];

        let label_width = lines
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);

        for (label, amount) in lines {
            write_summary_line(&mut out, label, amount, label_width)?;
        }

        writeln!(
            out,
            "\n Estimated delivery: {}\n",
            self.estimated_delivery.strftime("%B %-d, %Y")
        )
        .map_err(|_err| CheckoutError::IO)
    }
}

fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    amount: Money<'_, Currency>,
    label_width: usize,
) -> Result<(), CheckoutError> {
    writeln!(out, " {label:>label_width$}  {amount}").map_err(|_err| CheckoutError::IO)
}

/// Serialised order, as written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Order id
    pub id: i64,

    /// Line items
    pub items: Vec<LineItem>,

    /// Sum of line totals
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,

    /// Delivery fee
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,

    /// Tax
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,

    /// Coupon discount
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,

    /// Amount payable
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,

    /// ISO currency code
    pub currency: String,

    /// Active coupon code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,

    /// Delivery zone
    pub delivery_location: DeliveryZone,

    /// Estimated delivery date
    pub estimated_delivery: Date,

    /// Creation time
    pub order_date: Timestamp,
}

/// Receives orders handed off by a [`CheckoutAssembler`].
pub trait OrderSink {
    /// Accepts an order.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the order cannot be recorded. The cart
    /// is not cleared in that case.
    fn receive(&mut self, order: &OrderSnapshot) -> Result<(), CheckoutError>;
}

impl OrderSink for Vec<OrderSnapshot> {
    fn receive(&mut self, order: &OrderSnapshot) -> Result<(), CheckoutError> {
        self.push(order.clone());

        Ok(())
    }
}

/// Writes orders to storage: the latest under `checkoutData`, and every order
/// appended to the `orders` list.
#[derive(Debug, Clone)]
pub struct StorageOrderSink<S: Storage> {
    storage: S,
}

impl<S: Storage> StorageOrderSink<S> {
    /// Creates a sink writing to `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Orders recorded so far, oldest first. Malformed entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if storage cannot be read.
    pub fn orders(&self) -> Result<Vec<OrderRecord>, CheckoutError> {
        Ok(self
            .history()?
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }

    fn history(&self) -> Result<Vec<serde_json::Value>, CheckoutError> {
        let Some(raw) = self.storage.get(ORDERS_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(error) => {
                warn!(%error, "discarding malformed order history");

                Ok(Vec::new())
            }
        }
    }
}

impl<S: Storage> OrderSink for StorageOrderSink<S> {
    fn receive(&mut self, order: &OrderSnapshot) -> Result<(), CheckoutError> {
        let record = serde_json::to_value(order.to_record())?;
        let latest = serde_json::to_string(&record)?;
        let mut history = self.history()?;

        history.push(record);

        // History first: `checkoutData` never names an order missing from `orders`.
        self.storage
            .set(ORDERS_KEY, &serde_json::to_string(&history)?)?;
        self.storage.set(CHECKOUT_KEY, &latest)?;

        Ok(())
    }
}

/// Builds order snapshots from a cart store.
#[derive(Debug, Default, Copy, Clone)]
pub struct CheckoutAssembler {
    window: DeliveryWindow,
    policy: ClearPolicy,
}

impl CheckoutAssembler {
    /// Creates an assembler.
    pub fn new(window: DeliveryWindow, policy: ClearPolicy) -> Self {
        Self { window, policy }
    }

    /// Delivery estimate window.
    pub fn window(self) -> DeliveryWindow {
        self.window
    }

    /// What happens to the cart after hand-off.
    pub fn policy(self) -> ClearPolicy {
        self.policy
    }

    /// Snapshots the store's cart, timestamped now.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`]: the cart has no lines.
    /// - [`CheckoutError::Cart`]: the cart could not be priced.
    /// - [`CheckoutError::Date`]: the delivery date overflowed the calendar.
    pub fn assemble<S: Storage, O: CartObserver>(
        self,
        store: &CartStore<S, O>,
    ) -> Result<OrderSnapshot, CheckoutError> {
        self.assemble_at(store, Timestamp::now(), &mut rand::thread_rng())
    }

    /// Snapshots the store's cart at `now`, drawing the delivery estimate from `rng`.
    ///
    /// The estimate is the UTC calendar date of `now` plus a uniformly random
    /// number of days within the assembler's window.
    ///
    /// # Errors
    ///
    /// See [`CheckoutAssembler::assemble`].
    #[tracing::instrument(skip_all, fields(lines = store.cart().len()))]
    pub fn assemble_at<S: Storage, O: CartObserver, R: Rng + ?Sized>(
        self,
        store: &CartStore<S, O>,
        now: Timestamp,
        rng: &mut R,
    ) -> Result<OrderSnapshot, CheckoutError> {
        let cart = store.cart();

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let pricing = store.price()?;
        let days = self.window.sample_days(rng);
        let estimated_delivery = now
            .to_zoned(TimeZone::UTC)
            .date()
            .checked_add(days.days())?;

        Ok(OrderSnapshot {
            items: cart.items().to_vec(),
            pricing,
            coupon_code: cart.coupon().map(|coupon| coupon.code().to_string()),
            zone: cart.zone(),
            estimated_delivery,
            created_at: now,
        })
    }

    /// Assembles an order, passes it to `sink` and applies the clear policy.
    ///
    /// The cart is only cleared once the sink has accepted the order.
    ///
    /// # Errors
    ///
    /// Any error from [`CheckoutAssembler::assemble`], from the sink, or from
    /// clearing the cart.
    #[tracing::instrument(skip_all, fields(policy = ?self.policy))]
    pub fn hand_off<S: Storage, O: CartObserver, K: OrderSink + ?Sized>(
        self,
        store: &mut CartStore<S, O>,
        sink: &mut K,
    ) -> Result<OrderSnapshot, CheckoutError> {
        let order = self.assemble(store)?;

        sink.receive(&order)?;

        info!(
            order_id = order.order_id(),
            total = %order.pricing().total(),
            estimated_delivery = %order.estimated_delivery(),
            "handed off order"
        );

        if self.policy == ClearPolicy::AfterHandOff {
            store.clear()?;
        }

        Ok(order)
    }
}

//! Pricing
//!
//! Turns a cart's line items, delivery zone and active coupon into an
//! itemised total:
//!
//! 1. `subtotal` is the sum of unit price times quantity.
//! 2. `shipping` is the zone fee, or zero under a free-shipping coupon.
//! 3. `tax` is the tax rate applied to the gross subtotal, rounded to whole
//!    currency units. The discount does not reduce the taxable amount.
//! 4. `discount` comes from the coupon, if any.
//! 5. `total` is `subtotal + shipping + tax - discount`, never below zero.
//!
//! Amounts other than tax stay exact to the currency's minor unit.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use thiserror::Error;

use crate::{
    coupons::Coupon,
    delivery::{DeliveryZone, ZoneFees},
    items::LineItem,
};

/// Errors that can occur while pricing a cart.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// An intermediate amount exceeded the decimal range.
    #[error("amount overflowed while pricing the cart")]
    Overflow,

    /// An amount could not be represented in the currency's minor units.
    #[error("amount {0} cannot be represented in minor units")]
    MinorUnits(Decimal),
}

/// Looks up a supported currency by ISO code.
pub fn currency_from_code(code: &str) -> Option<&'static Currency> {
    match code.trim().to_ascii_uppercase().as_str() {
        "BDT" => Some(iso::BDT),
        "USD" => Some(iso::USD),
        "GBP" => Some(iso::GBP),
        "EUR" => Some(iso::EUR),
        _ => None,
    }
}

/// Store-wide pricing parameters.
#[derive(Debug, Copy, Clone)]
pub struct PricingRules {
    currency: &'static Currency,
    tax_rate: Percentage,
    zone_fees: ZoneFees,
}

impl PricingRules {
    /// Creates pricing rules.
    pub fn new(currency: &'static Currency, tax_rate: Percentage, zone_fees: ZoneFees) -> Self {
        Self {
            currency,
            tax_rate,
            zone_fees,
        }
    }

    /// Currency every amount is expressed in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Flat tax rate applied to the subtotal.
    pub fn tax_rate(&self) -> Percentage {
        self.tax_rate
    }

    /// Shipping fee table.
    pub fn zone_fees(&self) -> &ZoneFees {
        &self.zone_fees
    }

    /// Prices a set of line items.
    ///
    /// # Errors
    ///
    /// - [`PricingError::Overflow`]: an intermediate amount overflowed.
    /// - [`PricingError::MinorUnits`]: an amount does not fit in `i64` minor units.
    pub fn price(
        &self,
        items: &[LineItem],
        zone: DeliveryZone,
        coupon: Option<&Coupon>,
    ) -> Result<PriceBreakdown<'static>, PricingError> {
        let subtotal = subtotal(items)?;

        let shipping = if coupon.is_some_and(|coupon| coupon.kind().waives_shipping()) {
            Decimal::ZERO
        } else {
            self.zone_fees.fee(zone)
        };

        let tax = subtotal
            .checked_mul(self.tax_rate * Decimal::ONE)
            .ok_or(PricingError::Overflow)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        let discount = match coupon {
            Some(coupon) => coupon
                .kind()
                .discount_on(subtotal)
                .ok_or(PricingError::Overflow)?,
            None => Decimal::ZERO,
        };

        let total = subtotal
            .checked_add(shipping)
            .and_then(|amount| amount.checked_add(tax))
            .and_then(|amount| amount.checked_sub(discount))
            .ok_or(PricingError::Overflow)?
            .max(Decimal::ZERO);

        Ok(PriceBreakdown {
            subtotal: to_money(subtotal, self.currency)?,
            shipping: to_money(shipping, self.currency)?,
            tax: to_money(tax, self.currency)?,
            discount: to_money(discount, self.currency)?,
            total: to_money(total, self.currency)?,
            zone,
        })
    }
}

impl Default for PricingRules {
    /// Taka pricing with 5% tax and the standard zone fees.
    fn default() -> Self {
        Self {
            currency: iso::BDT,
            tax_rate: Percentage::from(Decimal::new(5, 2)),
            zone_fees: ZoneFees::default(),
        }
    }
}

/// Itemised totals for a cart.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PriceBreakdown<'a> {
    subtotal: Money<'a, Currency>,
    shipping: Money<'a, Currency>,
    tax: Money<'a, Currency>,
    discount: Money<'a, Currency>,
    total: Money<'a, Currency>,
    zone: DeliveryZone,
}

impl<'a> PriceBreakdown<'a> {
    /// Sum of all line totals
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// Delivery fee charged
    pub fn shipping(&self) -> Money<'a, Currency> {
        self.shipping
    }

    /// Tax on the gross subtotal, in whole units
    pub fn tax(&self) -> Money<'a, Currency> {
        self.tax
    }

    /// Coupon discount
    pub fn discount(&self) -> Money<'a, Currency> {
        self.discount
    }

    /// Amount payable
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Zone the shipping fee was taken from
    pub fn zone(&self) -> DeliveryZone {
        self.zone
    }

    /// Total rounded to whole currency units, as shown to shoppers.
    pub fn display_total(&self) -> Money<'a, Currency> {
        let rounded = self
            .total
            .amount()
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        to_money(rounded, self.total.currency()).unwrap_or(self.total)
    }
}

/// Sum of unit price times quantity over `items`.
fn subtotal(items: &[LineItem]) -> Result<Decimal, PricingError> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        item.line_total()
            .and_then(|line| acc.checked_add(line))
            .ok_or(PricingError::Overflow)
    })
}

/// Converts a major-unit amount to money, rounding to the currency's minor unit.
pub(crate) fn to_money(
    amount: Decimal,
    currency: &Currency,
) -> Result<Money<'_, Currency>, PricingError> {
    let mut minor =
        amount.round_dp_with_strategy(currency.exponent, RoundingStrategy::MidpointAwayFromZero);

    minor.rescale(currency.exponent);

    let minor =
        i64::try_from(minor.mantissa()).map_err(|_err| PricingError::MinorUnits(amount))?;

    Ok(Money::from_minor(minor, currency))
}

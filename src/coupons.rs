//! Coupons

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors raised when resolving or registering coupons.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouponError {
    /// The submitted code is not in the registry.
    #[error("invalid coupon code: {0}")]
    Invalid(String),

    /// Two coupons in one registry share a code.
    #[error("duplicate coupon code: {0}")]
    Duplicate(String),

    /// A coupon value is outside the range its kind allows.
    #[error("coupon {code} has an invalid value: {value}")]
    InvalidValue {
        /// Coupon code
        code: String,
        /// Offending value
        value: Decimal,
    },
}

/// How a coupon reduces the order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CouponKind {
    /// Take a percentage off the subtotal (e.g., "10% off").
    Percentage(Percentage),

    /// Take a fixed amount off the subtotal, never more than the subtotal.
    Fixed(Decimal),

    /// Waive the delivery fee.
    FreeShipping,
}

impl CouponKind {
    /// Amount taken off `subtotal`, in major units, before any rounding.
    ///
    /// Returns `None` if the percentage calculation overflows.
    pub fn discount_on(&self, subtotal: Decimal) -> Option<Decimal> {
        match self {
            CouponKind::Percentage(percent) => subtotal.checked_mul(*percent * Decimal::ONE),
            CouponKind::Fixed(amount) => Some((*amount).min(subtotal)),
            CouponKind::FreeShipping => Some(Decimal::ZERO),
        }
    }

    /// Whether the delivery fee is waived.
    pub fn waives_shipping(&self) -> bool {
        matches!(self, CouponKind::FreeShipping)
    }
}

/// A named discount rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    code: String,
    kind: CouponKind,
}

impl Coupon {
    /// Creates a coupon. The code is stored upper-cased.
    pub fn new(code: impl AsRef<str>, kind: CouponKind) -> Self {
        Self {
            code: normalise_code(code.as_ref()),
            kind,
        }
    }

    /// Percentage coupon from percent points (`10` means 10%).
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::InvalidValue`] unless `points` is within `0..=100`.
    pub fn percentage(code: impl AsRef<str>, points: Decimal) -> Result<Self, CouponError> {
        let code = normalise_code(code.as_ref());

        if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
            return Err(CouponError::InvalidValue { code, value: points });
        }

        Ok(Self {
            code,
            kind: CouponKind::Percentage(Percentage::from(points / Decimal::ONE_HUNDRED)),
        })
    }

    /// Fixed-amount coupon.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::InvalidValue`] if `amount` is negative.
    pub fn fixed(code: impl AsRef<str>, amount: Decimal) -> Result<Self, CouponError> {
        let code = normalise_code(code.as_ref());

        if amount < Decimal::ZERO {
            return Err(CouponError::InvalidValue {
                code,
                value: amount,
            });
        }

        Ok(Self {
            code,
            kind: CouponKind::Fixed(amount),
        })
    }

    /// Free-shipping coupon.
    pub fn free_shipping(code: impl AsRef<str>) -> Self {
        Self::new(code, CouponKind::FreeShipping)
    }

    /// Upper-cased code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Discount rule.
    pub fn kind(&self) -> &CouponKind {
        &self.kind
    }
}

fn normalise_code(code: &str) -> String {
    code.to_uppercase()
}

/// Fixed set of coupons a storefront accepts.
#[derive(Debug, Clone)]
pub struct CouponRegistry {
    coupons: FxHashMap<String, Coupon>,
}

impl CouponRegistry {
    /// An empty registry that accepts no codes.
    pub fn empty() -> Self {
        Self {
            coupons: FxHashMap::default(),
        }
    }

    /// Builds a registry from a list of coupons.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::Duplicate`] if two coupons share a code.
    pub fn with_coupons(coupons: impl IntoIterator<Item = Coupon>) -> Result<Self, CouponError> {
        let mut registry = Self::empty();

        for coupon in coupons {
            let code = coupon.code.clone();

            if registry.coupons.insert(code.clone(), coupon).is_some() {
                return Err(CouponError::Duplicate(code));
            }
        }

        Ok(registry)
    }

    /// Case-insensitive exact lookup.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::Invalid`] if no coupon has this code.
    pub fn resolve(&self, code: &str) -> Result<&Coupon, CouponError> {
        self.coupons
            .get(&normalise_code(code))
            .ok_or_else(|| CouponError::Invalid(code.to_string()))
    }

    /// Number of registered coupons.
    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }
}

impl Default for CouponRegistry {
    /// The storefront's launch coupons.
    fn default() -> Self {
        let mut coupons = FxHashMap::default();

        for coupon in [
            Coupon::new(
                "SAVE10",
                CouponKind::Percentage(Percentage::from(Decimal::new(10, 2))),
            ),
            Coupon::new("SAVE50", CouponKind::Fixed(Decimal::from(50))),
            Coupon::free_shipping("FREESHIP"),
            Coupon::new(
                "WELCOME",
                CouponKind::Percentage(Percentage::from(Decimal::new(15, 2))),
            ),
        ] {
            coupons.insert(coupon.code.clone(), coupon);
        }

        Self { coupons }
    }
}

//! Storefront configuration
//!
//! A storefront is described by a YAML document. Every field is optional and
//! falls back to the launch storefront's settings:
//!
//! ```yaml
//! currency: BDT
//! tax_rate: 5
//! zone_fees:
//!   local: 70
//!   remote: 120
//! delivery_window:
//!   min_days: 3
//!   max_days: 7
//! clear_cart_on_checkout: false
//! coupons:
//!   - type: percentage
//!     code: SAVE10
//!     value: 10
//!   - type: fixed
//!     code: SAVE50
//!     amount: 50
//!   - type: free_shipping
//!     code: FREESHIP
//! ```

use std::{fs, path::Path};

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    checkout::{CheckoutAssembler, ClearPolicy},
    coupons::{Coupon, CouponError, CouponRegistry},
    delivery::{DeliveryError, DeliveryWindow, ZoneFees},
    pricing::{PricingRules, currency_from_code},
    storage::Storage,
    store::CartStore,
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Tax rate outside 0..=100 percent
    #[error("Invalid tax rate: {0}%")]
    InvalidTaxRate(Decimal),

    /// A zone fee is negative
    #[error("Invalid zone fee: {0}")]
    InvalidZoneFee(Decimal),

    /// Invalid delivery window
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Invalid or duplicate coupon
    #[error(transparent)]
    Coupon(#[from] CouponError),
}

/// Coupon definition in YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponConfig {
    /// Percentage off the subtotal
    Percentage {
        /// Coupon code
        code: String,

        /// Percent points (`10` is 10%)
        #[serde(with = "rust_decimal::serde::float")]
        value: Decimal,
    },

    /// Fixed amount off the subtotal
    Fixed {
        /// Coupon code
        code: String,

        /// Amount in major currency units
        #[serde(with = "rust_decimal::serde::float")]
        amount: Decimal,
    },

    /// Free delivery
    FreeShipping {
        /// Coupon code
        code: String,
    },
}

impl TryFrom<&CouponConfig> for Coupon {
    type Error = CouponError;

    fn try_from(config: &CouponConfig) -> Result<Self, Self::Error> {
        match config {
            CouponConfig::Percentage { code, value } => Coupon::percentage(code, *value),
            CouponConfig::Fixed { code, amount } => Coupon::fixed(code, *amount),
            CouponConfig::FreeShipping { code } => Ok(Coupon::free_shipping(code)),
        }
    }
}

/// Storefront settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorefrontConfig {
    /// ISO currency code (BDT, USD, GBP or EUR)
    pub currency: String,

    /// Flat tax rate in percent points
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_rate: Decimal,

    /// Delivery fee per zone
    pub zone_fees: ZoneFees,

    /// Delivery estimate window
    pub delivery_window: DeliveryWindow,

    /// Empty the cart once an order has been handed off (off unless set)
    pub clear_cart_on_checkout: bool,

    /// Accepted coupons
    pub coupons: Vec<CouponConfig>,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            currency: "BDT".to_string(),
            tax_rate: Decimal::from(5),
            zone_fees: ZoneFees::default(),
            delivery_window: DeliveryWindow::default(),
            clear_cart_on_checkout: false,
            coupons: vec![
                CouponConfig::Percentage {
                    code: "SAVE10".to_string(),
                    value: Decimal::from(10),
                },
                CouponConfig::Fixed {
                    code: "SAVE50".to_string(),
                    amount: Decimal::from(50),
                },
                CouponConfig::FreeShipping {
                    code: "FREESHIP".to_string(),
                },
                CouponConfig::Percentage {
                    code: "WELCOME".to_string(),
                    value: Decimal::from(15),
                },
            ],
        }
    }
}

impl StorefrontConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the YAML is malformed or a setting is invalid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_norway::from_str(yaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Load and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Check every setting.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pricing_rules()?;
        self.coupon_registry()?;
        self.delivery_window.validate()?;

        Ok(())
    }

    /// Pricing rules for this storefront.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown currency, a tax rate outside
    /// `0..=100` or a negative fee.
    pub fn pricing_rules(&self) -> Result<PricingRules, ConfigError> {
        let currency = currency_from_code(&self.currency)
            .ok_or_else(|| ConfigError::UnknownCurrency(self.currency.clone()))?;

        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE_HUNDRED {
            return Err(ConfigError::InvalidTaxRate(self.tax_rate));
        }

        for fee in [self.zone_fees.local, self.zone_fees.remote] {
            if fee < Decimal::ZERO {
                return Err(ConfigError::InvalidZoneFee(fee));
            }
        }

        let tax_rate = Percentage::from(self.tax_rate / Decimal::ONE_HUNDRED);

        Ok(PricingRules::new(currency, tax_rate, self.zone_fees))
    }

    /// Coupons accepted by this storefront.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Coupon`] for an invalid value or a duplicate code.
    pub fn coupon_registry(&self) -> Result<CouponRegistry, ConfigError> {
        let coupons = self
            .coupons
            .iter()
            .map(Coupon::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CouponRegistry::with_coupons(coupons)?)
    }

    /// Checkout assembler using the configured window and clear policy.
    pub fn checkout_assembler(&self) -> CheckoutAssembler {
        let policy = if self.clear_cart_on_checkout {
            ClearPolicy::AfterHandOff
        } else {
            ClearPolicy::Keep
        };

        CheckoutAssembler::new(self.delivery_window, policy)
    }

    /// Opens a cart store over `storage` with these settings, rehydrating any saved cart.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the pricing or coupon settings are invalid.
    pub fn open_store<S: Storage>(&self, storage: S) -> Result<CartStore<S>, ConfigError> {
        let mut store = CartStore::new(storage, self.pricing_rules()?, self.coupon_registry()?);

        store.load();

        Ok(store)
    }
}

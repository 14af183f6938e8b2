//! Delivery zones, fees and delivery windows

use std::{fmt, str::FromStr};

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to delivery settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// A stored or configured zone name was not recognised.
    #[error("unknown delivery zone: {0}")]
    UnknownZone(String),

    /// The delivery window is empty or starts at day zero.
    #[error("invalid delivery window: {min_days}..={max_days} days")]
    InvalidWindow {
        /// Earliest delivery, in days
        min_days: u8,
        /// Latest delivery, in days
        max_days: u8,
    },
}

/// Fixed-fee shipping classification.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryZone {
    /// Deliveries inside the home city.
    #[default]
    #[serde(alias = "dhaka")]
    Local,

    /// Deliveries anywhere else.
    #[serde(alias = "outside")]
    Remote,
}

impl DeliveryZone {
    /// Human-readable label for summaries.
    pub fn label(self) -> &'static str {
        match self {
            DeliveryZone::Local => "Inside city",
            DeliveryZone::Remote => "Outside city",
        }
    }
}

impl fmt::Display for DeliveryZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeliveryZone::Local => "local",
            DeliveryZone::Remote => "remote",
        })
    }
}

impl FromStr for DeliveryZone {
    type Err = DeliveryError;

    /// Accepts both the current names and the ones older storefront builds stored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "dhaka" => Ok(DeliveryZone::Local),
            "remote" | "outside" => Ok(DeliveryZone::Remote),
            _ => Err(DeliveryError::UnknownZone(s.to_string())),
        }
    }
}

/// Shipping fee per zone, in major currency units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneFees {
    /// Fee for [`DeliveryZone::Local`]
    #[serde(with = "rust_decimal::serde::float")]
    pub local: Decimal,

    /// Fee for [`DeliveryZone::Remote`]
    #[serde(with = "rust_decimal::serde::float")]
    pub remote: Decimal,
}

impl ZoneFees {
    /// Fee charged for a zone.
    pub fn fee(&self, zone: DeliveryZone) -> Decimal {
        match zone {
            DeliveryZone::Local => self.local,
            DeliveryZone::Remote => self.remote,
        }
    }
}

impl Default for ZoneFees {
    fn default() -> Self {
        Self {
            local: Decimal::from(70),
            remote: Decimal::from(120),
        }
    }
}

/// Range of days, inclusive, within which an order is expected to arrive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    /// Earliest delivery, in days after the order
    pub min_days: u8,

    /// Latest delivery, in days after the order
    pub max_days: u8,
}

impl DeliveryWindow {
    /// Creates a validated window.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidWindow`] if `min_days` is zero or exceeds `max_days`.
    pub fn new(min_days: u8, max_days: u8) -> Result<Self, DeliveryError> {
        let window = Self { min_days, max_days };

        window.validate()?;

        Ok(window)
    }

    /// Checks the window is non-empty and starts after the order day.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidWindow`] if the window is not usable.
    pub fn validate(self) -> Result<(), DeliveryError> {
        if self.min_days == 0 || self.min_days > self.max_days {
            return Err(DeliveryError::InvalidWindow {
                min_days: self.min_days,
                max_days: self.max_days,
            });
        }

        Ok(())
    }

    /// Draws a uniformly random number of days within the window.
    pub fn sample_days<R: Rng + ?Sized>(self, rng: &mut R) -> i64 {
        let max = self.max_days.max(self.min_days);

        i64::from(rng.gen_range(self.min_days..=max))
    }
}

impl Default for DeliveryWindow {
    fn default() -> Self {
        Self {
            min_days: 3,
            max_days: 7,
        }
    }
}

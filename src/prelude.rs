//! Tally prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, QuantityChange},
    checkout::{
        CheckoutAssembler, CheckoutError, ClearPolicy, OrderRecord, OrderSink, OrderSnapshot,
        StorageOrderSink,
    },
    config::{ConfigError, CouponConfig, StorefrontConfig},
    coupons::{Coupon, CouponError, CouponKind, CouponRegistry},
    delivery::{DeliveryError, DeliveryWindow, DeliveryZone, ZoneFees},
    items::{LineItem, MAX_QUANTITY, ProductId, Quantity, QuantityOutOfRange},
    pricing::{PriceBreakdown, PricingError, PricingRules, currency_from_code},
    products::{Catalog, CatalogError, Product, ProductCatalog},
    storage::{FileStorage, MemoryStorage, Storage, StorageError},
    store::{CartError, CartEvent, CartObserver, CartStore, NoopObserver},
};

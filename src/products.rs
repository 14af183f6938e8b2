//! Products

use std::{fs, path::Path};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::items::ProductId;

/// Errors raised while loading a product catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog document is not valid JSON.
    #[error("failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),

    /// Two products share an id.
    #[error("duplicate product id {0}")]
    DuplicateProduct(ProductId),

    /// A product has a negative price.
    #[error("product {0} has a negative price")]
    NegativePrice(ProductId),
}

/// Product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product id
    pub id: ProductId,

    /// Product name
    pub name: String,

    /// Unit price, in major currency units
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// Image reference
    #[serde(default)]
    pub image: String,

    /// Category
    #[serde(default)]
    pub category: String,

    /// Brand, when the catalog records one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// Source of product records for callers assembling line items.
pub trait Catalog {
    /// Looks up a product by id.
    fn product(&self, id: ProductId) -> Option<&Product>;
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    products: Vec<Product>,
}

/// In-memory catalog keyed by product id.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: FxHashMap<ProductId, Product>,
}

impl ProductCatalog {
    /// Builds a catalog from a list of products.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::DuplicateProduct`]: two products share an id.
    /// - [`CatalogError::NegativePrice`]: a product is priced below zero.
    pub fn with_products(
        products: impl IntoIterator<Item = Product>,
    ) -> Result<Self, CatalogError> {
        let mut map = FxHashMap::default();

        for product in products {
            if product.price < Decimal::ZERO {
                return Err(CatalogError::NegativePrice(product.id));
            }

            let id = product.id;

            if map.insert(id, product).is_some() {
                return Err(CatalogError::DuplicateProduct(id));
            }
        }

        Ok(Self { products: map })
    }

    /// Parses a `{ "products": [...] }` catalog document.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the document is malformed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;

        Self::with_products(document.products)
    }

    /// Reads and parses a catalog document from disk.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path)?;

        Self::from_json_str(&json)
    }

    /// Number of products in the catalog.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Catalog for ProductCatalog {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }
}

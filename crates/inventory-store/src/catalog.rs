use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ProductId, Result};

/// A catalog product as seen by stock reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    /// Units in stock. Never negative.
    pub stock: i64,
}

impl CatalogProduct {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stock: stock.max(0),
        }
    }
}

/// Read and decrement access to the product catalog.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Finds products whose name equals `name` exactly.
    ///
    /// Comparison follows the store's default collation. Implementations may
    /// stop after two rows: callers only need to distinguish zero, one and
    /// several matches.
    async fn find_by_name(&self, name: &str) -> Result<Vec<CatalogProduct>>;

    /// Atomically decrements a product's stock and returns the new level.
    ///
    /// The decrement happens in a single store-side operation and clamps at
    /// zero. Fails with `ProductNotFound` if no row has the given ID.
    async fn decrement_stock(&self, product_id: &ProductId, quantity: u32) -> Result<i64>;

    /// Loads a product by ID.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<CatalogProduct>>;
}

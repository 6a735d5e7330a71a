//! Atomic stock decrements.

use common::ProductId;
use inventory_store::{Catalog, StoreError};
use thiserror::Error;

use crate::error::ItemFailure;

/// A failed stock decrement.
#[derive(Debug, Error)]
#[error("decrement of {product_id} failed: {source}")]
pub struct AdjustmentError {
    pub product_id: ProductId,
    #[source]
    pub source: StoreError,
}

impl From<AdjustmentError> for ItemFailure {
    fn from(err: AdjustmentError) -> Self {
        ItemFailure::Adjustment {
            message: err.source.to_string(),
        }
    }
}

/// Issues store-side atomic decrements.
///
/// Never reads the stock first: the catalog applies the decrement (and the
/// clamp at zero) in one operation.
#[derive(Debug, Clone)]
pub struct InventoryAdjuster<C> {
    catalog: C,
}

impl<C: Catalog> InventoryAdjuster<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Decrements a product's stock by `quantity` and returns the new level.
    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn decrement(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<i64, AdjustmentError> {
        let new_stock = self
            .catalog
            .decrement_stock(product_id, quantity)
            .await
            .map_err(|source| AdjustmentError {
                product_id: product_id.clone(),
                source,
            })?;

        metrics::counter!("stock_decrements_total").increment(1);
        if new_stock == 0 {
            tracing::info!(%product_id, "product is out of stock");
        }
        Ok(new_stock)
    }
}

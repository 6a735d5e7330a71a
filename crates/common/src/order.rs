//! Completed orders and their purchased line items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, ProductId};

/// One purchased product-quantity pair within an order.
///
/// The quantity is kept signed because it arrives untrusted from checkout
/// metadata; only positive quantities are ever applied to inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedLineItem {
    /// Display name, used as the lookup key when no product ID was captured.
    #[serde(alias = "name")]
    pub display_name: String,
    /// Product ID captured at purchase time, if any.
    #[serde(default, alias = "id")]
    pub product_id: Option<ProductId>,
    /// Number of units purchased.
    #[serde(alias = "qty")]
    pub quantity: i64,
}

impl PurchasedLineItem {
    /// Creates a line item with a known product ID.
    pub fn new(
        display_name: impl Into<String>,
        product_id: impl Into<ProductId>,
        quantity: i64,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            product_id: Some(product_id.into()),
            quantity,
        }
    }

    /// Creates a line item that must be resolved by display name.
    pub fn by_name(display_name: impl Into<String>, quantity: i64) -> Self {
        Self {
            display_name: display_name.into(),
            product_id: None,
            quantity,
        }
    }

    /// Returns the captured product ID unless it is missing or blank.
    pub fn direct_product_id(&self) -> Option<&ProductId> {
        self.product_id
            .as_ref()
            .filter(|id| !id.as_str().trim().is_empty())
    }

    /// Returns the quantity to apply to inventory, or `None` when it is
    /// zero, negative or too large for a stock decrement.
    pub fn applicable_quantity(&self) -> Option<u32> {
        u32::try_from(self.quantity).ok().filter(|q| *q > 0)
    }
}

/// A completed checkout handed over by one of the completion triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub items: Vec<PurchasedLineItem>,
    pub completed_at: DateTime<Utc>,
}

impl Order {
    /// Creates an order completed now.
    pub fn new(order_id: impl Into<OrderId>, items: Vec<PurchasedLineItem>) -> Self {
        Self {
            order_id: order_id.into(),
            items,
            completed_at: Utc::now(),
        }
    }

    /// Overrides the completion timestamp.
    pub fn completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = completed_at;
        self
    }
}

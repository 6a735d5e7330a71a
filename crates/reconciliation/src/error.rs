//! Reconciliation error types.

use common::OrderId;
use inventory_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single line item could not be applied.
///
/// Item failures are recorded in the result and never abort sibling items.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ItemFailure {
    /// Quantity was zero or negative.
    #[error("invalid quantity {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// Name lookup found no product, or more than one.
    #[error("product not found for '{name}' ({matches} matches)")]
    ProductNotFound { name: String, matches: usize },

    /// The catalog could not be queried.
    #[error("product lookup failed: {message}")]
    Resolution { message: String },

    /// The stock decrement failed.
    #[error("stock adjustment failed: {message}")]
    Adjustment { message: String },
}

impl ItemFailure {
    /// Returns true if retrying the same line may succeed without human
    /// intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Resolution { .. } | Self::Adjustment { .. })
    }

    /// Short label used in metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::ProductNotFound { .. } => "product_not_found",
            Self::Resolution { .. } => "resolution_error",
            Self::Adjustment { .. } => "adjustment_error",
        }
    }
}

/// Order-level errors returned to the caller instead of a result.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The order carries no line items at all.
    #[error("Order {0} has no line items")]
    EmptyOrder(OrderId),

    /// The ledger could not be read or claimed and the policy is fail closed.
    #[error("Ledger unavailable for order {order_id}: {source}")]
    LedgerUnavailable {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    /// Another trigger is reconciling the same order right now.
    #[error("Reconciliation already in progress for order {0}")]
    InProgress(OrderId),
}

impl ReconcileError {
    /// Returns true if the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::EmptyOrder(_))
    }
}

/// Convenience type alias for reconciliation results.
pub type Result<T> = std::result::Result<T, ReconcileError>;

//! Reconciliation outcomes.

use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ItemFailure;

/// Order-level classification of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every line was applied (now or by an earlier pass).
    Success,
    /// Some lines were applied, some failed. The ledger is not marked.
    PartialFailure,
    /// No line was applied. The ledger is not marked.
    TotalFailure,
}

impl Outcome {
    /// Classifies a pass from its processed and failed line counts.
    pub fn classify(processed: usize, failed: usize) -> Self {
        match (processed, failed) {
            (0, _) => Self::TotalFailure,
            (_, 0) => Self::Success,
            _ => Self::PartialFailure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::TotalFailure => "total_failure",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Stock was decremented in this pass.
    Applied { new_stock: i64 },
    /// An earlier pass already decremented this line; nothing was done.
    AlreadyApplied { new_stock: i64 },
    Failed { failure: ItemFailure },
}

/// Per-line detail of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub line_index: u32,
    pub display_name: String,
    /// Product the line resolved to, when resolution got that far.
    pub product_id: Option<ProductId>,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn applied(
        line_index: u32,
        display_name: impl Into<String>,
        product_id: ProductId,
        new_stock: i64,
    ) -> Self {
        Self {
            line_index,
            display_name: display_name.into(),
            product_id: Some(product_id),
            status: ItemStatus::Applied { new_stock },
        }
    }

    pub fn already_applied(
        line_index: u32,
        display_name: impl Into<String>,
        product_id: ProductId,
        new_stock: i64,
    ) -> Self {
        Self {
            line_index,
            display_name: display_name.into(),
            product_id: Some(product_id),
            status: ItemStatus::AlreadyApplied { new_stock },
        }
    }

    pub fn failed(
        line_index: u32,
        display_name: impl Into<String>,
        product_id: Option<ProductId>,
        failure: ItemFailure,
    ) -> Self {
        Self {
            line_index,
            display_name: display_name.into(),
            product_id,
            status: ItemStatus::Failed { failure },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ItemStatus::Failed { .. })
    }

    pub fn failure(&self) -> Option<&ItemFailure> {
        match &self.status {
            ItemStatus::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

/// Summary of one `reconcile` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub order_id: OrderId,
    pub outcome: Outcome,
    /// Lines whose stock is adjusted, whether in this pass or an earlier one.
    pub processed_count: usize,
    pub failed_count: usize,
    /// Lines skipped because an earlier pass already applied them.
    pub skipped_count: usize,
    pub total_count: usize,
    /// True when the ledger already marked the order and nothing was done.
    pub short_circuited: bool,
    /// True when the order is marked in the ledger after this call.
    pub ledger_marked: bool,
    pub items: Vec<ItemOutcome>,
}

impl ReconciliationResult {
    /// Result for an order the ledger already marks as applied.
    pub fn already_applied(order_id: OrderId, total_count: usize) -> Self {
        Self {
            order_id,
            outcome: Outcome::Success,
            processed_count: 0,
            failed_count: 0,
            skipped_count: 0,
            total_count,
            short_circuited: true,
            ledger_marked: true,
            items: Vec::new(),
        }
    }

    /// Builds a result from per-line outcomes. The ledger flag starts unset.
    pub fn from_items(order_id: OrderId, items: Vec<ItemOutcome>) -> Self {
        let failed_count = items.iter().filter(|i| i.is_failed()).count();
        let skipped_count = items
            .iter()
            .filter(|i| matches!(i.status, ItemStatus::AlreadyApplied { .. }))
            .count();
        let processed_count = items.len() - failed_count;

        Self {
            order_id,
            outcome: Outcome::classify(processed_count, failed_count),
            processed_count,
            failed_count,
            skipped_count,
            total_count: items.len(),
            short_circuited: false,
            ledger_marked: false,
            items,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Human-readable summary for the storefront notification.
    pub fn summary(&self) -> String {
        if self.short_circuited {
            return format!("stock already updated for order {}", self.order_id);
        }
        match self.outcome {
            Outcome::Success => format!(
                "stock updated for {} of {} items",
                self.processed_count, self.total_count
            ),
            Outcome::PartialFailure | Outcome::TotalFailure => format!(
                "stock updated for {} of {} items; contact support",
                self.processed_count, self.total_count
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Outcome::classify(2, 0), Outcome::Success);
        assert_eq!(Outcome::classify(1, 1), Outcome::PartialFailure);
        assert_eq!(Outcome::classify(0, 2), Outcome::TotalFailure);
        assert_eq!(Outcome::classify(0, 0), Outcome::TotalFailure);
    }

    #[test]
    fn test_counts_from_items() {
        let order_id = OrderId::new("ORD-1");
        let result = ReconciliationResult::from_items(
            order_id,
            vec![
                ItemOutcome::applied(0, "Cape", ProductId::new("p1"), 3),
                ItemOutcome::already_applied(1, "Sword", ProductId::new("p2"), 2),
                ItemOutcome::failed(
                    2,
                    "Hat",
                    None,
                    ItemFailure::ProductNotFound {
                        name: "Hat".to_string(),
                        matches: 0,
                    },
                ),
            ],
        );

        assert_eq!(result.processed_count, 2);
        assert_eq!(result.skipped_count, 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.total_count, 3);
        assert_eq!(result.outcome, Outcome::PartialFailure);
        assert_eq!(
            result.summary(),
            "stock updated for 2 of 3 items; contact support"
        );
    }

    #[test]
    fn test_short_circuit_summary() {
        let result = ReconciliationResult::already_applied(OrderId::new("ORD-1"), 2);
        assert!(result.is_success());
        assert_eq!(result.summary(), "stock already updated for order ORD-1");
    }

    #[test]
    fn test_item_outcome_json_shape() {
        let item = ItemOutcome::failed(
            0,
            "Sword",
            None,
            ItemFailure::InvalidQuantity { quantity: 0 },
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["failure"]["reason"], "invalid_quantity");

        let item = ItemOutcome::applied(1, "Cape", ProductId::new("p1"), 3);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "applied");
        assert_eq!(json["new_stock"], 3);
        assert_eq!(json["product_id"], "p1");
    }
}

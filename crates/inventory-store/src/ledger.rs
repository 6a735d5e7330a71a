use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OrderId, ProductId, Result};

/// Identifies one holder of an order claim.
///
/// Only the holder of the current token can release the claim, so a pass
/// whose lease ran out cannot drop the claim of the pass that took over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimToken(Uuid);

impl ClaimToken {
    /// Generates a fresh token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of trying to claim an order for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// The caller now holds the claim and may adjust stock.
    Acquired(ClaimToken),
    /// The order is already marked as applied.
    AlreadyApplied,
    /// Another caller holds an unexpired claim.
    InProgress,
}

impl ClaimOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, ClaimOutcome::Acquired(_))
    }
}

/// Identity of an applied line within its order.
///
/// Lines are identified by what they decrement rather than by position, so
/// a trigger that delivers the same order with its lines reordered still
/// finds the lines applied before. `occurrence` tells apart identical lines
/// (same product, same quantity) of one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurrence: u32,
}

impl LineKey {
    pub fn new(product_id: ProductId, quantity: u32, occurrence: u32) -> Self {
        Self {
            product_id,
            quantity,
            occurrence,
        }
    }
}

/// A single order line whose stock decrement has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLine {
    /// Position of the line in the pass that applied it.
    pub line_index: u32,
    #[serde(flatten)]
    pub key: LineKey,
    /// Stock level reported by the decrement.
    pub new_stock: i64,
    pub applied_at: DateTime<Utc>,
}

impl AppliedLine {
    pub fn new(line_index: u32, key: LineKey, new_stock: i64) -> Self {
        Self {
            line_index,
            key,
            new_stock,
            applied_at: Utc::now(),
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.key.product_id
    }
}

/// Idempotency ledger for stock reconciliation.
///
/// Markers are permanent: once an order or a line is marked it stays marked
/// for the lifetime of the store.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Returns true if stock has already been adjusted for the order.
    async fn is_marked(&self, order_id: &OrderId) -> Result<bool>;

    /// Marks the order as applied and drops any claim on it.
    ///
    /// Marking an already marked order is a no-op. Once marked, claims on
    /// the order are never granted again, whoever held the dropped one.
    async fn mark(&self, order_id: &OrderId) -> Result<()>;

    /// Atomically claims the order for a reconciliation pass.
    ///
    /// The claim expires after `lease` so a crashed pass does not block the
    /// order forever.
    async fn try_claim(&self, order_id: &OrderId, lease: Duration) -> Result<ClaimOutcome>;

    /// Releases a claim without marking the order.
    ///
    /// Does nothing unless `token` is the current holder's.
    async fn release(&self, order_id: &OrderId, token: ClaimToken) -> Result<()>;

    /// Returns the lines already applied for the order, ordered by index.
    async fn applied_lines(&self, order_id: &OrderId) -> Result<Vec<AppliedLine>>;

    /// Records that a line's decrement has been applied.
    ///
    /// Recording the same line key twice keeps the first record.
    async fn mark_line(&self, order_id: &OrderId, line: AppliedLine) -> Result<()>;
}

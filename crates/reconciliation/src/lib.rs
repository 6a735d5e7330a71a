//! Post-checkout stock reconciliation.
//!
//! Turns the line items of a payment-confirmed order into catalog stock
//! decrements, at most once per order, even when the same completion is
//! delivered by several triggers (success page, webhook, manual retry).
//!
//! A reconciliation pass:
//! 1. Short-circuits if the ledger already marks the order as applied
//! 2. Claims the order so concurrent triggers do not overlap
//! 3. Resolves and decrements each line, skipping lines applied by an
//!    earlier partial pass
//! 4. Marks the ledger only when every line succeeded

pub mod adjuster;
pub mod coordinator;
pub mod error;
pub mod options;
pub mod outcome;
pub mod resolver;

pub use adjuster::{AdjustmentError, InventoryAdjuster};
pub use coordinator::Reconciler;
pub use error::{ItemFailure, ReconcileError};
pub use options::{LedgerFailurePolicy, ReconcileOptions};
pub use outcome::{ItemOutcome, ItemStatus, Outcome, ReconciliationResult};
pub use resolver::{ProductResolver, ResolveError};

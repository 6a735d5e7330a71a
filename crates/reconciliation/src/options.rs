//! Reconciliation tuning knobs.

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do when the ledger cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerFailurePolicy {
    /// Abort the pass and report `LedgerUnavailable`. No stock is touched.
    #[default]
    FailClosed,
    /// Treat the order as not yet processed and carry on.
    FailOpen,
}

impl LedgerFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailClosed => "fail_closed",
            Self::FailOpen => "fail_open",
        }
    }
}

impl std::fmt::Display for LedgerFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown ledger failure policy: {0} (expected fail_closed or fail_open)")]
pub struct UnknownPolicy(pub String);

impl FromStr for LedgerFailurePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_closed" | "closed" => Ok(Self::FailClosed),
            "fail_open" | "open" => Ok(Self::FailOpen),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Options for a [`crate::Reconciler`].
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub ledger_failure_policy: LedgerFailurePolicy,
    /// How long a claim keeps other triggers out of an order.
    pub claim_lease: Duration,
}

impl ReconcileOptions {
    pub fn new(ledger_failure_policy: LedgerFailurePolicy, claim_lease: Duration) -> Self {
        Self {
            ledger_failure_policy,
            claim_lease,
        }
    }

    pub fn with_policy(mut self, policy: LedgerFailurePolicy) -> Self {
        self.ledger_failure_policy = policy;
        self
    }
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            ledger_failure_policy: LedgerFailurePolicy::FailClosed,
            claim_lease: Duration::seconds(60),
        }
    }
}

//! Reconciliation orchestrator.

use std::collections::HashMap;

use common::{Order, OrderId, ProductId, PurchasedLineItem};
use inventory_store::{AppliedLine, Catalog, ClaimOutcome, Ledger, LineKey, StoreError};

use crate::adjuster::InventoryAdjuster;
use crate::error::{ItemFailure, ReconcileError, Result};
use crate::options::{LedgerFailurePolicy, ReconcileOptions};
use crate::outcome::{ItemOutcome, Outcome, ReconciliationResult};
use crate::resolver::ProductResolver;

/// Drives stock reconciliation for completed orders.
///
/// Safe to call for the same order from several triggers at once: the
/// ledger claim lets one pass through and turns the others away with
/// `InProgress`. Lines applied by a pass that did not finish are recorded
/// individually and skipped on the next attempt.
pub struct Reconciler<C, L>
where
    C: Catalog,
    L: Ledger,
{
    resolver: ProductResolver<C>,
    adjuster: InventoryAdjuster<C>,
    ledger: L,
    options: ReconcileOptions,
}

impl<C, L> Reconciler<C, L>
where
    C: Catalog + Clone,
    L: Ledger,
{
    /// Creates a reconciler with default options.
    pub fn new(catalog: C, ledger: L) -> Self {
        Self::with_options(catalog, ledger, ReconcileOptions::default())
    }

    pub fn with_options(catalog: C, ledger: L, options: ReconcileOptions) -> Self {
        Self {
            resolver: ProductResolver::new(catalog.clone()),
            adjuster: InventoryAdjuster::new(catalog),
            ledger,
            options,
        }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Reconciles a completed order.
    pub async fn reconcile_order(&self, order: &Order) -> Result<ReconciliationResult> {
        self.reconcile(&order.order_id, &order.items).await
    }

    /// Applies the stock decrements for an order's line items.
    ///
    /// Returns `Success` without touching stock when the ledger already
    /// marks the order. Item-level failures are reported in the result; only
    /// an empty order, an unreachable ledger under the fail-closed policy, or
    /// a concurrent pass on the same order produce an error.
    #[tracing::instrument(skip(self, order_id, items), fields(order_id = %order_id, items = items.len()))]
    pub async fn reconcile(
        &self,
        order_id: &OrderId,
        items: &[PurchasedLineItem],
    ) -> Result<ReconciliationResult> {
        if items.is_empty() {
            return Err(ReconcileError::EmptyOrder(order_id.clone()));
        }

        metrics::counter!("reconciliation_runs_total").increment(1);
        let start = std::time::Instant::now();

        // 1. Short-circuit on an already marked order
        match self.ledger.is_marked(order_id).await {
            Ok(true) => return Ok(self.short_circuit(order_id, items.len())),
            Ok(false) => {}
            Err(e) => self.on_ledger_error(order_id, e)?,
        }

        // 2. Claim the order so concurrent triggers do not overlap
        let claim = match self
            .ledger
            .try_claim(order_id, self.options.claim_lease)
            .await
        {
            Ok(ClaimOutcome::Acquired(token)) => Some(token),
            Ok(ClaimOutcome::AlreadyApplied) => {
                return Ok(self.short_circuit(order_id, items.len()));
            }
            Ok(ClaimOutcome::InProgress) => {
                metrics::counter!("reconciliation_conflicts_total").increment(1);
                tracing::info!("another pass holds the claim");
                return Err(ReconcileError::InProgress(order_id.clone()));
            }
            Err(e) => {
                self.on_ledger_error(order_id, e)?;
                None
            }
        };

        // 3. Apply the lines
        let result = self.apply_lines(order_id, items).await;

        // mark() drops the claim on success; anything else must release it
        let marked = matches!(&result, Ok(r) if r.ledger_marked);
        if let Some(token) = claim
            && !marked
            && let Err(e) = self.ledger.release(order_id, token).await
        {
            tracing::warn!(error = %e, "failed to release reconciliation claim");
        }

        let result = result?;
        let duration = start.elapsed().as_secs_f64();
        metrics::histogram!("reconciliation_duration_seconds").record(duration);
        metrics::counter!("reconciliation_outcomes_total", "outcome" => result.outcome.as_str())
            .increment(1);

        match result.outcome {
            Outcome::Success => tracing::info!(
                processed = result.processed_count,
                skipped = result.skipped_count,
                ledger_marked = result.ledger_marked,
                duration,
                "reconciliation succeeded"
            ),
            Outcome::PartialFailure | Outcome::TotalFailure => tracing::warn!(
                outcome = %result.outcome,
                processed = result.processed_count,
                failed = result.failed_count,
                duration,
                "reconciliation incomplete"
            ),
        }

        Ok(result)
    }

    async fn apply_lines(
        &self,
        order_id: &OrderId,
        items: &[PurchasedLineItem],
    ) -> Result<ReconciliationResult> {
        let applied: HashMap<LineKey, AppliedLine> = match self.ledger.applied_lines(order_id).await
        {
            Ok(lines) => lines.into_iter().map(|l| (l.key.clone(), l)).collect(),
            Err(e) => {
                self.on_ledger_error(order_id, e)?;
                HashMap::new()
            }
        };

        let mut occurrences = HashMap::new();
        let mut outcomes = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let line_index = u32::try_from(index).unwrap_or(u32::MAX);
            let outcome = self
                .apply_line(order_id, line_index, item, &applied, &mut occurrences)
                .await;
            if let Some(failure) = outcome.failure() {
                metrics::counter!(
                    "reconciliation_item_failures_total",
                    "reason" => failure.reason()
                )
                .increment(1);
                tracing::warn!(line_index, error = %failure, "line item not applied");
            }
            outcomes.push(outcome);
        }

        let mut result = ReconciliationResult::from_items(order_id.clone(), outcomes);
        if result.outcome == Outcome::Success {
            match self.ledger.mark(order_id).await {
                Ok(()) => result.ledger_marked = true,
                // Line markers still protect a retry from double decrements
                Err(e) => tracing::error!(error = %e, "failed to mark order in ledger"),
            }
        }

        Ok(result)
    }

    /// Resolves and decrements one line unless an earlier pass applied it.
    ///
    /// `occurrences` counts the lines of this pass per product and quantity
    /// so identical lines get distinct keys.
    #[tracing::instrument(
        skip(self, order_id, item, applied, occurrences),
        fields(name = %item.display_name)
    )]
    async fn apply_line(
        &self,
        order_id: &OrderId,
        line_index: u32,
        item: &PurchasedLineItem,
        applied: &HashMap<LineKey, AppliedLine>,
        occurrences: &mut HashMap<(ProductId, u32), u32>,
    ) -> ItemOutcome {
        let Some(quantity) = item.applicable_quantity() else {
            return ItemOutcome::failed(
                line_index,
                &item.display_name,
                None,
                ItemFailure::InvalidQuantity {
                    quantity: item.quantity,
                },
            );
        };

        let product_id = match self.resolver.resolve(item).await {
            Ok(id) => id,
            Err(e) => {
                return ItemOutcome::failed(line_index, &item.display_name, None, e.into());
            }
        };

        let occurrence = occurrences
            .entry((product_id.clone(), quantity))
            .or_insert(0);
        let key = LineKey::new(product_id.clone(), quantity, *occurrence);
        *occurrence += 1;

        if let Some(line) = applied.get(&key) {
            tracing::debug!(applied_as = line.line_index, "line already applied by an earlier pass");
            return ItemOutcome::already_applied(
                line_index,
                &item.display_name,
                product_id,
                line.new_stock,
            );
        }

        match self.adjuster.decrement(&product_id, quantity).await {
            Ok(new_stock) => {
                let line = AppliedLine::new(line_index, key, new_stock);
                if let Err(e) = self.ledger.mark_line(order_id, line).await {
                    tracing::error!(error = %e, "failed to record applied line");
                }
                ItemOutcome::applied(line_index, &item.display_name, product_id, new_stock)
            }
            Err(e) => {
                ItemOutcome::failed(line_index, &item.display_name, Some(product_id), e.into())
            }
        }
    }

    fn short_circuit(&self, order_id: &OrderId, total: usize) -> ReconciliationResult {
        metrics::counter!("reconciliation_short_circuits_total").increment(1);
        tracing::info!("order already reconciled, skipping");
        ReconciliationResult::already_applied(order_id.clone(), total)
    }

    /// Applies the ledger failure policy to a ledger error.
    fn on_ledger_error(&self, order_id: &OrderId, source: StoreError) -> Result<()> {
        metrics::counter!("reconciliation_ledger_errors_total").increment(1);
        match self.options.ledger_failure_policy {
            LedgerFailurePolicy::FailClosed => {
                tracing::error!(error = %source, "ledger unavailable, aborting");
                Err(ReconcileError::LedgerUnavailable {
                    order_id: order_id.clone(),
                    source,
                })
            }
            LedgerFailurePolicy::FailOpen => {
                tracing::warn!(error = %source, "ledger unavailable, proceeding as unprocessed");
                Ok(())
            }
        }
    }
}

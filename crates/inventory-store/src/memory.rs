use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::{
    AppliedLine, Catalog, CatalogProduct, ClaimOutcome, ClaimToken, Ledger, LineKey, OrderId,
    ProductId, Result, StoreError,
};

#[derive(Default)]
struct CatalogState {
    products: HashMap<ProductId, CatalogProduct>,
    failing_products: HashSet<ProductId>,
}

/// In-memory catalog for testing and local runs.
///
/// Decrements are applied under a single write lock, which gives the same
/// per-product serialization the PostgreSQL implementation gets from its
/// conditional update.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
    fail_lookups: Arc<AtomicBool>,
    lookup_calls: Arc<AtomicUsize>,
    decrement_calls: Arc<AtomicUsize>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog seeded with the given products.
    pub fn with_products(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
        let mut state = CatalogState::default();
        for product in products {
            state.products.insert(product.id.clone(), product);
        }
        Self {
            state: Arc::new(RwLock::new(state)),
            ..Self::default()
        }
    }

    /// Returns the current stock of a product.
    pub async fn stock_of(&self, product_id: &ProductId) -> Option<i64> {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map(|p| p.stock)
    }

    /// Makes every name lookup fail as if the store were unreachable.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Makes decrements of the given product fail as if the store were
    /// unreachable.
    pub async fn fail_decrements_for(&self, product_id: impl Into<ProductId>) {
        self.state
            .write()
            .await
            .failing_products
            .insert(product_id.into());
    }

    /// Clears all injected decrement failures.
    pub async fn clear_decrement_failures(&self) {
        self.state.write().await.failing_products.clear();
    }

    /// Number of name lookups issued so far.
    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    /// Number of decrements attempted so far, failed ones included.
    pub fn decrement_calls(&self) -> usize {
        self.decrement_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn find_by_name(&self, name: &str) -> Result<Vec<CatalogProduct>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog lookup failed".to_string()));
        }

        let state = self.state.read().await;
        let mut matches: Vec<_> = state
            .products
            .values()
            .filter(|p| p.name == name)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.truncate(2);
        Ok(matches)
    }

    async fn decrement_stock(&self, product_id: &ProductId, quantity: u32) -> Result<i64> {
        self.decrement_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.write().await;
        if state.failing_products.contains(product_id) {
            return Err(StoreError::Unavailable(format!(
                "decrement of {product_id} failed"
            )));
        }

        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        product.stock = (product.stock - i64::from(quantity)).max(0);
        Ok(product.stock)
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Option<CatalogProduct>> {
        Ok(self.state.read().await.products.get(product_id).cloned())
    }
}

struct Claim {
    token: ClaimToken,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    marked: HashMap<OrderId, DateTime<Utc>>,
    claims: HashMap<OrderId, Claim>,
    lines: HashMap<OrderId, HashMap<LineKey, AppliedLine>>,
}

/// In-memory idempotency ledger for testing and local runs.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    unavailable: Arc<AtomicBool>,
    fail_marks: Arc<AtomicBool>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every ledger operation fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes only `mark` fail, leaving claims and line markers working.
    pub fn set_fail_marks(&self, fail: bool) {
        self.fail_marks.store(fail, Ordering::SeqCst);
    }

    /// Returns true if a claim is currently held on the order.
    pub async fn is_claimed(&self, order_id: &OrderId) -> bool {
        self.state
            .read()
            .await
            .claims
            .get(order_id)
            .is_some_and(|claim| claim.expires_at > Utc::now())
    }

    /// Number of orders marked as applied.
    pub async fn marked_count(&self) -> usize {
        self.state.read().await.marked.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ledger unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn is_marked(&self, order_id: &OrderId) -> Result<bool> {
        self.check_available()?;
        Ok(self.state.read().await.marked.contains_key(order_id))
    }

    async fn mark(&self, order_id: &OrderId) -> Result<()> {
        self.check_available()?;
        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ledger write failed".to_string()));
        }
        let mut state = self.state.write().await;
        state.marked.entry(order_id.clone()).or_insert_with(Utc::now);
        state.claims.remove(order_id);
        Ok(())
    }

    async fn try_claim(&self, order_id: &OrderId, lease: Duration) -> Result<ClaimOutcome> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.marked.contains_key(order_id) {
            return Ok(ClaimOutcome::AlreadyApplied);
        }

        let now = Utc::now();
        if let Some(claim) = state.claims.get(order_id)
            && claim.expires_at > now
        {
            return Ok(ClaimOutcome::InProgress);
        }

        let token = ClaimToken::generate();
        state.claims.insert(
            order_id.clone(),
            Claim {
                token,
                expires_at: now + lease,
            },
        );
        Ok(ClaimOutcome::Acquired(token))
    }

    async fn release(&self, order_id: &OrderId, token: ClaimToken) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        if state
            .claims
            .get(order_id)
            .is_some_and(|claim| claim.token == token)
        {
            state.claims.remove(order_id);
        }
        Ok(())
    }

    async fn applied_lines(&self, order_id: &OrderId) -> Result<Vec<AppliedLine>> {
        self.check_available()?;
        let mut lines: Vec<AppliedLine> = self
            .state
            .read()
            .await
            .lines
            .get(order_id)
            .map(|lines| lines.values().cloned().collect())
            .unwrap_or_default();
        lines.sort_by_key(|line| line.line_index);
        Ok(lines)
    }

    async fn mark_line(&self, order_id: &OrderId, line: AppliedLine) -> Result<()> {
        self.check_available()?;
        self.state
            .write()
            .await
            .lines
            .entry(order_id.clone())
            .or_default()
            .entry(line.key.clone())
            .or_insert(line);
        Ok(())
    }
}

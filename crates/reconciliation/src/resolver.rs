//! Maps purchased line items to catalog product IDs.

use common::{ProductId, PurchasedLineItem};
use inventory_store::{Catalog, StoreError};
use thiserror::Error;

use crate::error::ItemFailure;

/// Why a line item could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No product, or more than one, has exactly this name.
    #[error("no unique product named '{name}' ({matches} matches)")]
    NotFound { name: String, matches: usize },

    /// The catalog lookup itself failed.
    #[error("catalog lookup failed: {0}")]
    Store(#[from] StoreError),
}

impl From<ResolveError> for ItemFailure {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { name, matches } => {
                ItemFailure::ProductNotFound { name, matches }
            }
            ResolveError::Store(e) => ItemFailure::Resolution {
                message: e.to_string(),
            },
        }
    }
}

/// Resolves line items by captured product ID, falling back to an exact
/// name lookup.
///
/// A captured ID is trusted as-is; the checkout flow is responsible for
/// having recorded a real product.
#[derive(Debug, Clone)]
pub struct ProductResolver<C> {
    catalog: C,
}

impl<C: Catalog> ProductResolver<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Resolves one line item to a product ID.
    #[tracing::instrument(skip(self, item), fields(name = %item.display_name))]
    pub async fn resolve(&self, item: &PurchasedLineItem) -> Result<ProductId, ResolveError> {
        if let Some(product_id) = item.direct_product_id() {
            return Ok(product_id.clone());
        }

        let mut matches = self.catalog.find_by_name(&item.display_name).await?;
        if matches.len() == 1 {
            let product = matches.remove(0);
            tracing::debug!(product_id = %product.id, "resolved line item by name");
            return Ok(product.id);
        }

        if matches.len() > 1 {
            tracing::warn!("ambiguous product name, refusing to pick one");
        }
        Err(ResolveError::NotFound {
            name: item.display_name.clone(),
            matches: matches.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_store::{CatalogProduct, InMemoryCatalog};

    fn resolver() -> (ProductResolver<InMemoryCatalog>, InMemoryCatalog) {
        let catalog = InMemoryCatalog::with_products([
            CatalogProduct::new("p1", "Cape", 5),
            CatalogProduct::new("p2", "Sword", 3),
            CatalogProduct::new("p3", "Sword of Dawn", 7),
            CatalogProduct::new("h1", "Hat", 1),
            CatalogProduct::new("h2", "Hat", 1),
        ]);
        (ProductResolver::new(catalog.clone()), catalog)
    }

    #[tokio::test]
    async fn test_direct_id_skips_lookup() {
        let (resolver, catalog) = resolver();
        let item = PurchasedLineItem::new("Whatever", "p9", 1);

        let id = resolver.resolve(&item).await.unwrap();
        assert_eq!(id, ProductId::new("p9"));
        assert_eq!(catalog.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_id_falls_back_to_name() {
        let (resolver, catalog) = resolver();
        let item = PurchasedLineItem::new("Sword", "", 1);

        let id = resolver.resolve(&item).await.unwrap();
        assert_eq!(id, ProductId::new("p2"));
        assert_eq!(catalog.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_exact_match_does_not_match_similar_names() {
        let (resolver, _) = resolver();

        let id = resolver
            .resolve(&PurchasedLineItem::by_name("Sword of Dawn", 1))
            .await
            .unwrap();
        assert_eq!(id, ProductId::new("p3"));

        let result = resolver
            .resolve(&PurchasedLineItem::by_name("Sword of", 1))
            .await;
        assert!(matches!(
            result,
            Err(ResolveError::NotFound { matches: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_ambiguous_name_is_not_found() {
        let (resolver, _) = resolver();

        let result = resolver.resolve(&PurchasedLineItem::by_name("Hat", 1)).await;
        assert!(matches!(
            result,
            Err(ResolveError::NotFound { matches: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_store_error_is_distinct_from_not_found() {
        let (resolver, catalog) = resolver();
        catalog.set_fail_lookups(true);

        let err = resolver
            .resolve(&PurchasedLineItem::by_name("Cape", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Store(_)));
        assert!(ItemFailure::from(err).is_retryable());
    }
}

//! Catalog stock lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use inventory_store::{Catalog, CatalogProduct, Ledger};

use crate::error::ApiError;
use crate::routes::orders::AppState;

/// GET /products/:id: current stock of a product.
#[tracing::instrument(skip(state))]
pub async fn get<C, L>(
    State(state): State<Arc<AppState<C, L>>>,
    Path(id): Path<String>,
) -> Result<Json<CatalogProduct>, ApiError>
where
    C: Catalog + Clone + 'static,
    L: Ledger + 'static,
{
    let product = state
        .catalog
        .get_product(&ProductId::new(id.as_str()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(product))
}

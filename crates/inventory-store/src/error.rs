use thiserror::Error;

use crate::ProductId;

/// Errors that can occur when interacting with the catalog or the ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product row targeted by a stock decrement does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A stored row holds a value outside its column's domain.
    #[error("Invalid value {value} in column {column}")]
    InvalidRow { column: &'static str, value: i64 },

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

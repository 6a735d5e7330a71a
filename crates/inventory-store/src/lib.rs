//! Storage ports for stock reconciliation.
//!
//! Two collaborators live here: the [`Catalog`], which resolves products by
//! name and applies atomic stock decrements, and the [`Ledger`], which
//! records which orders (and which lines of an order) have already been
//! applied. Both come with an in-memory implementation for tests and local
//! runs and a PostgreSQL implementation for deployments.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;

pub use catalog::{Catalog, CatalogProduct};
pub use common::{OrderId, ProductId};
pub use error::{Result, StoreError};
pub use ledger::{AppliedLine, ClaimOutcome, ClaimToken, Ledger, LineKey};
pub use memory::{InMemoryCatalog, InMemoryLedger};
pub use postgres::PostgresStore;

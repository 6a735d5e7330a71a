//! Shared types for the stock reconciliation service.

pub mod order;
pub mod types;

pub use order::{Order, PurchasedLineItem};
pub use types::{OrderId, ProductId};

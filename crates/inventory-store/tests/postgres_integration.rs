//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p inventory-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Duration;
use inventory_store::{
    AppliedLine, Catalog, ClaimOutcome, ClaimToken, Ledger, LineKey, OrderId, PostgresStore,
    ProductId, StoreError,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool, cleared tables and a seeded catalog
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE products, reconciliation_ledger, reconciliation_claims, reconciliation_lines",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        r#"
        INSERT INTO products (id, name, stock) VALUES
            ('p1', 'Cape', 5),
            ('p2', 'Sword', 3),
            ('p3', 'Sword of Dawn', 7),
            ('p4', 'Hat', 1),
            ('p5', 'Hat', 1)
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

#[tokio::test]
async fn test_find_by_name_exact_match() {
    let store = get_test_store().await;

    let found = store.find_by_name("Sword").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ProductId::new("p2"));
    assert_eq!(found[0].stock, 3);

    assert!(store.find_by_name("Swor").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_by_name_returns_duplicates() {
    let store = get_test_store().await;

    let found = store.find_by_name("Hat").await.unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_decrement_returns_new_stock_and_clamps() {
    let store = get_test_store().await;

    let stock = store
        .decrement_stock(&ProductId::new("p1"), 2)
        .await
        .unwrap();
    assert_eq!(stock, 3);

    let stock = store
        .decrement_stock(&ProductId::new("p1"), 10)
        .await
        .unwrap();
    assert_eq!(stock, 0);

    let product = store
        .get_product(&ProductId::new("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 0);
}

#[tokio::test]
async fn test_decrement_unknown_product() {
    let store = get_test_store().await;

    let result = store.decrement_stock(&ProductId::new("missing"), 1).await;
    assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
}

#[tokio::test]
async fn test_concurrent_decrements_serialize() {
    let store = get_test_store().await;
    sqlx::query("UPDATE products SET stock = 100 WHERE id = 'p1'")
        .execute(store.pool())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .decrement_stock(&ProductId::new("p1"), 7)
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let product = store
        .get_product(&ProductId::new("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 30);
}

fn acquired(outcome: ClaimOutcome) -> ClaimToken {
    match outcome {
        ClaimOutcome::Acquired(token) => token,
        other => panic!("expected an acquired claim, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ledger_mark_and_claims() {
    let store = get_test_store().await;
    let order_id = OrderId::new("ORD-1");
    let lease = Duration::seconds(60);

    assert!(!store.is_marked(&order_id).await.unwrap());
    assert!(store.try_claim(&order_id, lease).await.unwrap().is_acquired());
    assert_eq!(
        store.try_claim(&order_id, lease).await.unwrap(),
        ClaimOutcome::InProgress
    );

    store.mark(&order_id).await.unwrap();
    store.mark(&order_id).await.unwrap();
    assert!(store.is_marked(&order_id).await.unwrap());
    assert_eq!(
        store.try_claim(&order_id, lease).await.unwrap(),
        ClaimOutcome::AlreadyApplied
    );
}

#[tokio::test]
async fn test_expired_claim_is_taken_over() {
    let store = get_test_store().await;
    let order_id = OrderId::new("ORD-2");

    let stale = acquired(
        store
            .try_claim(&order_id, Duration::seconds(-5))
            .await
            .unwrap(),
    );
    let current = acquired(
        store
            .try_claim(&order_id, Duration::seconds(60))
            .await
            .unwrap(),
    );
    assert_ne!(stale, current);

    store.release(&order_id, current).await.unwrap();
    assert!(
        store
            .try_claim(&order_id, Duration::seconds(60))
            .await
            .unwrap()
            .is_acquired()
    );
}

#[tokio::test]
async fn test_stale_holder_cannot_release_current_claim() {
    let store = get_test_store().await;
    let order_id = OrderId::new("ORD-5");
    let lease = Duration::seconds(60);

    let stale = acquired(
        store
            .try_claim(&order_id, Duration::seconds(-5))
            .await
            .unwrap(),
    );
    let current = acquired(store.try_claim(&order_id, lease).await.unwrap());

    store.release(&order_id, stale).await.unwrap();
    assert_eq!(
        store.try_claim(&order_id, lease).await.unwrap(),
        ClaimOutcome::InProgress
    );

    store.release(&order_id, current).await.unwrap();
    assert!(store.try_claim(&order_id, lease).await.unwrap().is_acquired());
}

#[tokio::test]
async fn test_concurrent_claims_single_winner() {
    let store = get_test_store().await;
    let order_id = OrderId::new("ORD-3");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let order_id = order_id.clone();
        handles.push(tokio::spawn(async move {
            store
                .try_claim(&order_id, Duration::seconds(60))
                .await
                .unwrap()
        }));
    }

    let mut acquired = 0;
    for handle in handles {
        if handle.await.unwrap().is_acquired() {
            acquired += 1;
        }
    }
    assert_eq!(acquired, 1);
}

#[tokio::test]
async fn test_applied_lines_roundtrip() {
    let store = get_test_store().await;
    let order_id = OrderId::new("ORD-4");
    let cape = LineKey::new(ProductId::new("p1"), 2, 0);
    let sword = LineKey::new(ProductId::new("p2"), 1, 0);

    store
        .mark_line(&order_id, AppliedLine::new(1, sword.clone(), 2))
        .await
        .unwrap();
    store
        .mark_line(&order_id, AppliedLine::new(0, cape.clone(), 3))
        .await
        .unwrap();
    // Same key at another position keeps the first record
    store
        .mark_line(&order_id, AppliedLine::new(1, cape.clone(), 42))
        .await
        .unwrap();
    // Identical product and quantity, second occurrence
    store
        .mark_line(
            &order_id,
            AppliedLine::new(2, LineKey::new(ProductId::new("p1"), 2, 1), 1),
        )
        .await
        .unwrap();

    let lines = store.applied_lines(&order_id).await.unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].line_index, 0);
    assert_eq!(lines[0].key, cape);
    assert_eq!(lines[0].new_stock, 3);
    assert_eq!(lines[1].key, sword);
    assert_eq!(lines[2].key.occurrence, 1);
}

#[tokio::test]
async fn test_corrupt_line_row_is_an_error() {
    let store = get_test_store().await;
    let order_id = OrderId::new("ORD-6");

    sqlx::query(
        r#"
        INSERT INTO reconciliation_lines
            (order_id, product_id, quantity, occurrence, line_index, new_stock)
        VALUES ($1, 'p1', 1, 0, 4294967296, 3)
        "#,
    )
    .bind(order_id.as_str())
    .execute(store.pool())
    .await
    .unwrap();

    let result = store.applied_lines(&order_id).await;
    assert!(matches!(
        result,
        Err(StoreError::InvalidRow {
            column: "line_index",
            ..
        })
    ));
}

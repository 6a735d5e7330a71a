use common::{OrderId, PurchasedLineItem};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory_store::{CatalogProduct, InMemoryCatalog, InMemoryLedger, Ledger};
use reconciliation::Reconciler;

fn make_catalog(products: usize) -> InMemoryCatalog {
    InMemoryCatalog::with_products(
        (0..products).map(|i| CatalogProduct::new(format!("p{i}"), format!("Skin {i}"), 1_000_000)),
    )
}

fn make_items(count: usize, by_name: bool) -> Vec<PurchasedLineItem> {
    (0..count)
        .map(|i| {
            if by_name {
                PurchasedLineItem::by_name(format!("Skin {i}"), 1)
            } else {
                PurchasedLineItem::new(format!("Skin {i}"), format!("p{i}"), 1)
            }
        })
        .collect()
}

fn bench_reconcile_direct_ids(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let catalog = make_catalog(100);
    let reconciler = Reconciler::new(catalog, InMemoryLedger::new());
    let items = make_items(10, false);

    c.bench_function("reconciliation/reconcile_10_items_direct_ids", |b| {
        b.iter(|| {
            rt.block_on(async {
                reconciler
                    .reconcile(&OrderId::generate(), &items)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_reconcile_by_name(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let catalog = make_catalog(1_000);
    let reconciler = Reconciler::new(catalog, InMemoryLedger::new());
    let items = make_items(10, true);

    c.bench_function("reconciliation/reconcile_10_items_by_name", |b| {
        b.iter(|| {
            rt.block_on(async {
                reconciler
                    .reconcile(&OrderId::generate(), &items)
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_replay_short_circuit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryLedger::new();
    let reconciler = Reconciler::new(make_catalog(10), ledger.clone());
    let items = make_items(10, false);
    let order_id = OrderId::new("ORD-BENCH");
    rt.block_on(ledger.mark(&order_id)).unwrap();

    c.bench_function("reconciliation/replay_marked_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                reconciler.reconcile(&order_id, &items).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_reconcile_direct_ids,
    bench_reconcile_by_name,
    bench_replay_short_circuit
);
criterion_main!(benches);

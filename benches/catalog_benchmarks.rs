use catalog_store::models::Product;
use catalog_store::{CatalogStore, CollectionId, StoreConfig};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;
use tokio::runtime::Runtime;

const BULK_SIZE: usize = 100;

fn setup(rt: &Runtime) -> CatalogStore {
    let store = CatalogStore::new(StoreConfig::temporary());
    rt.block_on(async {
        store.seed_initial_data().await.unwrap();
    });
    store
}

fn bench_basic_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = setup(&rt);
    let products = store.repository::<Product>();

    let mut group = c.benchmark_group("basic_operations");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("single_add", |b| {
        b.iter(|| {
            rt.block_on(products.add(black_box(&Product::new("Bench", "Books", 1.0, 1))))
                .unwrap()
        })
    });

    group.bench_function("single_get", |b| {
        b.iter(|| rt.block_on(store.get(CollectionId::Products, black_box(1u64))).unwrap())
    });

    group.bench_function("get_by_index", |b| {
        b.iter(|| {
            rt.block_on(store.get_by_index(
                CollectionId::Products,
                "category",
                black_box("Electronics"),
            ))
            .unwrap()
        })
    });

    group.finish();
}

fn bench_scans(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("scans");

    for size in [BULK_SIZE, BULK_SIZE * 10] {
        let store = CatalogStore::new(StoreConfig::temporary());
        let products = store.repository::<Product>();
        rt.block_on(async {
            for i in 0..size {
                let category = if i % 2 == 0 { "Electronics" } else { "Sports" };
                products
                    .add(&Product::new(format!("Product {}", i), category, 10.0, i as i64))
                    .await
                    .unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::new("get_all", size), &size, |b, _| {
            b.iter(|| rt.block_on(store.get_all(CollectionId::Products)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("search_by_name", size), &size, |b, _| {
            b.iter(|| {
                rt.block_on(store.search_by_name(CollectionId::Products, black_box("product 4")))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_basic_operations, bench_scans);
criterion_main!(benches);

//! Matching engine benchmarks.
//!
//! Run with: cargo bench -p keel-core

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use keel_core::{
    EngineConfig, FeeSchedule, MatchingEngine, NewOrder, NullListener, OrderCondition, Price, Quantity, Side,
};

type Engine = MatchingEngine<NullListener, FeeSchedule>;

fn create_engine() -> Engine {
    MatchingEngine::new(EngineConfig::default(), FeeSchedule::default(), Some(NullListener))
}

fn limit(id: u64, side: Side, price: i64, qty: i64) -> NewOrder {
    NewOrder::limit(id, id, side, Price::from_int(price), Quantity::from_int(qty))
}

/// Resting order into an empty book.
fn bench_insert_empty(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_empty");
    group.throughput(Throughput::Elements(1));

    group.bench_function("limit_order", |b| {
        let mut engine = create_engine();
        let mut order_id = 0u64;

        b.iter(|| {
            order_id += 1;
            black_box(engine.add_order(limit(order_id, Side::Buy, 10_000, 100), order_id))
        })
    });

    group.finish();
}

/// Resting order into a book that already holds `depth` asks.
fn bench_insert_deep_book(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_deep_book");
    group.throughput(Throughput::Elements(1));

    for depth in [100u64, 1000, 10000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut engine = create_engine();
            for i in 0..depth {
                let _ = engine.add_order(limit(i + 1, Side::Sell, 10_000 + (i % 100) as i64, 100), i);
            }

            let mut order_id = depth + 1;
            b.iter(|| {
                order_id += 1;
                // Below the best ask, never matches.
                black_box(engine.add_order(limit(order_id, Side::Buy, 9_990, 100), order_id))
            })
        });
    }

    group.finish();
}

/// IOC sweeping `count` resting orders at one price.
fn bench_match_multiple(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_multiple");
    group.throughput(Throughput::Elements(1));

    for count in [1u64, 5, 10] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut engine = create_engine();
                    for i in 0..count {
                        let _ = engine.add_order(limit(i + 1, Side::Sell, 10_000, 10), i);
                    }
                    engine
                },
                |mut engine| {
                    let buy = limit(1_000, Side::Buy, 10_000, 10 * count as i64)
                        .with_condition(OrderCondition::ImmediateOrCancel);
                    black_box(engine.add_order(buy, 1_000))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Stop cascade: one trade releases `count` chained stops.
fn bench_stop_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("stop_cascade");

    for count in [10u64, 100] {
        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut engine = create_engine();
                    for i in 0..=count {
                        let _ = engine.add_order(limit(i + 1, Side::Sell, 100 + i as i64, 1), i);
                    }
                    for i in 0..count {
                        let stop = NewOrder::market(10_000 + i, 10_000 + i, Side::Buy, Quantity::from_int(1))
                            .with_stop_price(Price::from_int(100 + i as i64));
                        let _ = engine.add_order(stop, count + i);
                    }
                    engine
                },
                |mut engine| black_box(engine.add_order(limit(99_999, Side::Buy, 100, 1), 99_999)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Mixed flow across ten price levels.
fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(10000));

    group.bench_function("mixed_workload", |b| {
        b.iter_batched(
            create_engine,
            |mut engine| {
                for i in 0..10000u64 {
                    let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                    let price = 10_000 + (i % 10) as i64;
                    black_box(engine.add_order(limit(i + 1, side, price, 100), i));
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_empty,
    bench_insert_deep_book,
    bench_match_multiple,
    bench_stop_cascade,
    bench_throughput,
);

criterion_main!(benches);

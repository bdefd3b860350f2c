//! Benchmark harness using Criterion for latency measurement.
//!
//! Measures:
//! - Submit (no match)
//! - Submit (full match)
//! - Cancel
//! - Modify
//! - Mixed workload

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tick_lob::{CancelOrder, Command, Engine, ModifyOrder, NewOrder, PriceGrid, Side};

fn engine(capacity: u32) -> Engine {
    let grid = PriceGrid::new(0, 200_000, 1).expect("valid grid");
    let mut engine = Engine::new(capacity, grid);
    engine.warm_up();
    engine
}

/// Generate a random submit command
fn random_submit(rng: &mut ChaCha8Rng, order_id: u64) -> Command {
    let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
    Command::Submit(NewOrder::new(
        order_id,
        side,
        rng.gen_range(9900..10100) * 10, // 990.00 to 1010.00
        rng.gen_range(1..1000),
    ))
}

/// Benchmark: Submit that rests (no matching)
fn bench_submit_no_match(c: &mut Criterion) {
    let mut engine = engine(2_000_000);
    let mut order_id = 0u64;

    c.bench_function("submit_no_match", |b| {
        b.iter(|| {
            order_id += 1;
            black_box(engine.process_command(Command::Submit(NewOrder::buy(order_id, 9000, 100))))
        })
    });
}

/// Benchmark: Submit that fully matches
fn bench_submit_full_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_full_match");

    for depth in [1u64, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let mut engine = engine(100_000);

            for i in 0..depth {
                engine.process_command(Command::Submit(NewOrder::sell(i, 10000, 100)));
            }

            let mut order_id = 1000u64;

            b.iter(|| {
                order_id += 1;
                let result = engine.process_command(Command::Submit(NewOrder::buy(order_id, 10000, 100)));

                // Replenish the matched order
                engine.process_command(Command::Submit(NewOrder::sell(order_id + 1_000_000_000, 10000, 100)));

                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmark: Cancel
fn bench_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancel");

    for book_size in [100u64, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(book_size), book_size, |b, &book_size| {
            let mut engine = engine(100_000);

            for i in 0..book_size {
                let (side, price) = if i % 2 == 0 {
                    (Side::Buy, 9000 + (i % 100) * 10)
                } else {
                    (Side::Sell, 11000 + (i % 100) * 10)
                };
                engine.process_command(Command::Submit(NewOrder::new(i, side, price, 100)));
            }

            let mut cancel_id = 0u64;
            let mut next_order_id = book_size;

            b.iter(|| {
                let result = engine.process_command(Command::Cancel(CancelOrder { order_id: cancel_id }));

                // Replenish on the same side
                let (side, price) = if cancel_id % 2 == 0 {
                    (Side::Buy, 9000 + (cancel_id % 100) * 10)
                } else {
                    (Side::Sell, 11000 + (cancel_id % 100) * 10)
                };
                engine.process_command(Command::Submit(NewOrder::new(next_order_id, side, price, 100)));

                cancel_id = next_order_id;
                next_order_id += 1;

                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmark: In-place modify
fn bench_modify(c: &mut Criterion) {
    let mut engine = engine(100_000);
    for i in 0..1000u64 {
        engine.process_command(Command::Submit(NewOrder::buy(i, 9000 + (i % 100) * 10, 100)));
    }

    let mut i = 0u64;
    c.bench_function("modify_in_place", |b| {
        b.iter(|| {
            i += 1;
            black_box(engine.process_command(Command::Modify(ModifyOrder {
                order_id: i % 1000,
                new_qty: 50 + (i % 100) as i64,
            })))
        })
    });
}

/// Benchmark: Mixed workload
fn bench_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_workload");

    // 70% submit, 30% cancel
    group.bench_function("70_submit_30_cancel", |b| {
        let mut engine = engine(2_000_000);

        let mut rng = ChaCha8Rng::seed_from_u64(0xDEADBEEF);
        let mut order_id = 0u64;

        for _ in 0..1000 {
            order_id += 1;
            engine.process_command(random_submit(&mut rng, order_id));
        }

        b.iter(|| {
            if rng.gen_bool(0.7) {
                order_id += 1;
                black_box(engine.process_command(random_submit(&mut rng, order_id)))
            } else {
                let cancel_id = rng.gen_range(1..=order_id);
                black_box(engine.process_command(Command::Cancel(CancelOrder { order_id: cancel_id })))
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_submit_no_match,
    bench_submit_full_match,
    bench_cancel,
    bench_modify,
    bench_mixed_workload,
);

criterion_main!(benches);

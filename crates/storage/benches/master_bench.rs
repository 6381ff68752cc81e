//! Benchmarks for master table fill and update.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_core::{DataType, Op, Scalar, Schema, Table, OP_COLUMN};
use strata_storage::MasterState;

fn test_schema() -> Schema {
    Schema::new(vec![
        ("id".into(), DataType::Int64),
        ("price".into(), DataType::Float64),
        ("sector".into(), DataType::Str),
    ])
}

fn make_batch(start: i64, count: i64, op: Op) -> Table {
    let sectors = ["Tech", "Finance", "Health", "Energy", "Consumer"];
    let mut t = Table::new(test_schema().with_column(OP_COLUMN, DataType::UInt8));
    for (r, i) in (start..start + count).enumerate() {
        t.set(0, r, Scalar::Int64(i));
        if op == Op::Insert {
            t.set(1, r, Scalar::Float64(100.0 + i as f64 * 0.1));
            t.set(2, r, Scalar::from(sectors[i as usize % sectors.len()]));
        }
        t.set(3, r, op.to_scalar());
    }
    t
}

fn master_fill_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("master_fill");
    for rows in [1_000i64, 10_000, 100_000].iter() {
        let batch = make_batch(0, *rows, Op::Insert);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &batch, |b, batch| {
            b.iter(|| {
                let mut master = MasterState::new(test_schema(), "id").unwrap();
                master.fill_master_table(batch);
                black_box(master)
            });
        });
    }
    group.finish();
}

fn master_update_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("master_update");
    let total = 100_000i64;
    for changed in [100i64, 1_000, 10_000].iter() {
        let updates = make_batch(0, *changed, Op::Insert);
        let deletes = make_batch(*changed, *changed, Op::Delete);

        group.bench_with_input(BenchmarkId::new("update", changed), &updates, |b, batch| {
            b.iter_batched(
                || {
                    let mut master = MasterState::new(test_schema(), "id").unwrap();
                    master.fill_master_table(&make_batch(0, total, Op::Insert));
                    master
                },
                |mut master| {
                    master.update_master_table(batch);
                    black_box(master)
                },
                criterion::BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("delete", changed), &deletes, |b, batch| {
            b.iter_batched(
                || {
                    let mut master = MasterState::new(test_schema(), "id").unwrap();
                    master.fill_master_table(&make_batch(0, total, Op::Insert));
                    master
                },
                |mut master| {
                    master.update_master_table(batch);
                    black_box(master.get_pkeyed_table().num_rows())
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, master_fill_benchmark, master_update_benchmark);
criterion_main!(benches);

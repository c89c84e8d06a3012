use common::{PropertyId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Investment, Money, allocate_shares};

fn build_investments(count: i64) -> Vec<Investment> {
    let property_id = PropertyId::new();
    (1..=count)
        .map(|i| {
            Investment::new(
                UserId::new(),
                property_id,
                Money::from_naira(10_000 + i * 137),
                format!("PAY-{i:05}"),
            )
        })
        .collect()
}

fn bench_allocate_shares_small(c: &mut Criterion) {
    let investments = build_investments(10);

    c.bench_function("domain/allocate_shares_10", |b| {
        b.iter(|| allocate_shares(Money::from_naira(1_000_000), &investments).unwrap());
    });
}

fn bench_allocate_shares_large(c: &mut Criterion) {
    let investments = build_investments(1_000);

    c.bench_function("domain/allocate_shares_1000", |b| {
        b.iter(|| allocate_shares(Money::from_naira(250_000_000), &investments).unwrap());
    });
}

criterion_group!(benches, bench_allocate_shares_small, bench_allocate_shares_large);
criterion_main!(benches);

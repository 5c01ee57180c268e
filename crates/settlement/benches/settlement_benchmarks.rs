use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use splitledger_core::{ExpenseId, Money, UserId};
use splitledger_settlement::{aggregate_balances, plan_settlements};
use splitledger_splits::{AllocationPolicy, Expense, allocate};

fn group(n: usize) -> Vec<UserId> {
    (0..n).map(|_| UserId::new()).collect()
}

fn bench_allocation(c: &mut Criterion) {
    let mut g = c.benchmark_group("allocate");
    for &n in &[3usize, 30, 300] {
        let participants = group(n);
        let shares = AllocationPolicy::shares(
            participants.iter().enumerate().map(|(i, &u)| (u, (i % 7 + 1) as u32)),
        )
        .unwrap();

        g.throughput(Throughput::Elements(n as u64));
        g.bench_with_input(BenchmarkId::new("equal", n), &participants, |b, p| {
            b.iter(|| allocate(black_box(Money::from_cents(1_000_003)), p, &AllocationPolicy::Equal))
        });
        g.bench_with_input(BenchmarkId::new("shares", n), &participants, |b, p| {
            b.iter(|| allocate(black_box(Money::from_cents(1_000_003)), p, &shares))
        });
    }
    g.finish();
}

fn bench_aggregate_and_plan(c: &mut Criterion) {
    let mut g = c.benchmark_group("settle");
    for &n in &[10usize, 100, 1_000] {
        let members = group(n);
        let expenses: Vec<Expense> = (0..n * 5)
            .map(|i| {
                let payer = members[i % n];
                let mut participants: Vec<UserId> = (0..4).map(|k| members[(i + k * 7) % n]).collect();
                participants.sort();
                participants.dedup();
                Expense::new(
                    ExpenseId::new(),
                    payer,
                    Money::from_cents(1_000 + i as i64 * 13),
                    participants,
                    AllocationPolicy::Equal,
                    Utc::now(),
                )
                .unwrap()
            })
            .collect();

        g.throughput(Throughput::Elements(expenses.len() as u64));
        g.bench_with_input(BenchmarkId::new("aggregate", n), &expenses, |b, e| {
            b.iter(|| aggregate_balances(black_box(e), &[], &members))
        });

        let balances = aggregate_balances(&expenses, &[], &members).unwrap();
        g.bench_with_input(BenchmarkId::new("plan", n), &balances, |b, bal| {
            b.iter(|| plan_settlements(black_box(bal)))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_allocation, bench_aggregate_and_plan);
criterion_main!(benches);

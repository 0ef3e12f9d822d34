use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use medrank::prelude::*;
use medrank::ranking::{aggregate_providers, filter_by_procedure, rank_providers};
use std::hint::black_box;
use std::sync::OnceLock;

const STATES: [&str; 8] = ["CA", "TX", "FL", "NY", "PA", "OH", "IL", "GA"];

static RECORDS: OnceLock<Vec<BillingRecord>> = OnceLock::new();

// Synthetic extract: 20k providers, knee and hip rows, some providers billing twice
fn get_records() -> &'static [BillingRecord] {
    RECORDS.get_or_init(|| {
        (0..40_000u64)
            .map(|i| {
                let provider = i % 20_000;
                BillingRecord {
                    procedure_code: if i % 3 == 0 { "27130" } else { "27447" }.to_string(),
                    first_name: format!("First{}", provider),
                    last_name: format!("Last{}", provider % 5_000),
                    credentials: if provider % 2 == 0 { Some("MD".to_string()) } else { None },
                    state: STATES[(provider % STATES.len() as u64) as usize].to_string(),
                    total_services: 11 + (i * 7919) % 400,
                    rvu: 20.0 + (i % 97) as f64,
                    avg_submitted_charge: 4_000.0 + (i % 1_000) as f64,
                    avg_allowed_amount: 1_400.0 + (i % 300) as f64,
                    avg_paid_amount: 1_100.0 + ((i * 31) % 500) as f64,
                    avg_standardized_amount: 1_050.0 + (i % 250) as f64,
                }
            })
            .collect()
    })
}

fn benchmark_pipeline_stages(c: &mut Criterion) {
    let records = get_records();
    let knee = ProcedureCode::knee();
    let options = AggregationOptions::default();

    c.bench_function("filter_by_procedure", |b| {
        b.iter(|| filter_by_procedure(black_box(records), black_box(&knee)))
    });

    let filtered = filter_by_procedure(records, &knee);
    c.bench_function("aggregate_providers", |b| {
        b.iter(|| aggregate_providers(black_box(filtered.iter().copied()), &options))
    });

    let aggregation = aggregate_providers(filtered.iter().copied(), &options).unwrap();
    let mut group = c.benchmark_group("rank_providers");
    for metric in [RankingMetric::ServiceCount, RankingMetric::PaymentAmount] {
        group.bench_with_input(BenchmarkId::from_parameter(metric.as_str()), &metric, |b, &metric| {
            b.iter(|| rank_providers(black_box(&aggregation), &knee, metric))
        });
    }
    group.finish();
}

fn benchmark_session_queries(c: &mut Criterion) {
    let mut session = BillingDataset::new(get_records().to_vec())
        .into_session(Selection::default(), AggregationOptions::default())
        .unwrap();

    c.bench_function("lookup_provider", |b| {
        b.iter(|| session.lookup_provider(black_box("First19999"), black_box("Last4999")))
    });

    c.bench_function("state_cohort", |b| {
        b.iter(|| session.state_cohort(black_box("tx")).len())
    });

    c.bench_function("metric_toggle", |b| {
        b.iter(|| {
            let metric = session.selection().metric.toggled();
            session.set_metric(metric);
        })
    });
}

criterion_group!(benches, benchmark_pipeline_stages, benchmark_session_queries);
criterion_main!(benches);

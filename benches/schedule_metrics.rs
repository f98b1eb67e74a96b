use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use transformers_lightning_rs::config::LightningConfig;
use transformers_lightning_rs::metrics::{AveragePrecision, RetrievalAccumulator, Scorer};
use transformers_lightning_rs::scheduler::{LrSchedule, SchedulePolicy};
use transformers_lightning_rs::RetrievalMetric;

const CONFIG_YAML: &str = r#"
learning_rate: 2.0e-5
scheduler:
  policy: cosine_with_hard_restarts
  num_warmup_steps: 1000
  num_training_steps: 100000
  num_cycles: 4.0
layerwise:
  decay_rate: 0.8
  num_layers: 12
retrieval:
  metrics:
    - name: hit_rate
      k: 1
    - name: precision
      k: 5
    - name: reciprocal_rank
  empty_target_action: skip
"#;

// Deterministic retrieval batch: `num_queries` queries of `per_query` entries
fn generate_batch(num_queries: usize, per_query: usize) -> (Vec<i64>, Vec<f64>, Vec<i64>) {
    let total = num_queries * per_query;
    let mut ids = Vec::with_capacity(total);
    let mut preds = Vec::with_capacity(total);
    let mut target = Vec::with_capacity(total);

    for i in 0..total {
        ids.push((i % num_queries) as i64);
        preds.push(((i * 7919) % 1000) as f64 / 1000.0);
        target.push(i64::from(i % 5 == 0));
    }

    (ids, preds, target)
}

fn bench_schedule_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule_step");

    let policies = [
        SchedulePolicy::LinearWithWarmup {
            num_warmup_steps: 1000,
            num_training_steps: 100_000,
        },
        SchedulePolicy::CosineWithHardRestarts {
            num_warmup_steps: 1000,
            num_training_steps: 100_000,
            num_cycles: 4.0,
        },
        SchedulePolicy::PolynomialDecayWithWarmup {
            num_warmup_steps: 1000,
            num_training_steps: 100_000,
            power: 2.0,
        },
    ];

    for policy in policies {
        group.bench_function(policy.name(), |b| {
            let mut schedule = LrSchedule::new(policy.clone()).unwrap();
            b.iter(|| black_box(schedule.step()));
        });
    }

    group.finish();
}

fn bench_schedule_trace(c: &mut Criterion) {
    c.bench_function("schedule_trace_10k", |b| {
        let schedule = LrSchedule::new(SchedulePolicy::CosineWithWarmup {
            num_warmup_steps: 500,
            num_training_steps: 10_000,
            num_cycles: 0.5,
        })
        .unwrap();
        b.iter(|| black_box(schedule.trace(10_000)));
    });
}

fn bench_metric_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric_compute");

    for num_queries in [100, 1000, 10_000].iter() {
        let (ids, preds, target) = generate_batch(*num_queries, 10);
        let hit_rate = RetrievalMetric::hit_rate(1).unwrap();
        let map = RetrievalMetric::new(Scorer::AveragePrecision(AveragePrecision));

        group.bench_with_input(
            BenchmarkId::new("hit_rate@1", num_queries),
            num_queries,
            |b, _| {
                b.iter(|| black_box(hit_rate.compute(&ids, &preds, &target).unwrap()));
            },
        );
        group.bench_with_input(BenchmarkId::new("map", num_queries), num_queries, |b, _| {
            b.iter(|| black_box(map.compute(&ids, &preds, &target).unwrap()));
        });
    }

    group.finish();
}

fn bench_accumulator(c: &mut Criterion) {
    c.bench_function("accumulator_100_batches", |b| {
        let batches: Vec<_> = (0..100).map(|_| generate_batch(32, 8)).collect();

        b.iter(|| {
            let mut acc = RetrievalAccumulator::new(RetrievalMetric::hit_rate(1).unwrap());
            for (ids, preds, target) in &batches {
                acc.update(ids, preds, target).unwrap();
            }
            black_box(acc.compute().unwrap())
        });
    });
}

fn bench_config_from_yaml(c: &mut Criterion) {
    c.bench_function("config_from_yaml", |b| {
        b.iter(|| {
            let config: LightningConfig = black_box(serde_yaml::from_str(CONFIG_YAML).unwrap());
            black_box(config);
        });
    });
}

fn bench_config_validate(c: &mut Criterion) {
    c.bench_function("config_validate", |b| {
        let config = LightningConfig::electra_layerwise_preset();
        b.iter(|| {
            let result = black_box(config.validate());
            black_box(result).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_schedule_step,
    bench_schedule_trace,
    bench_metric_compute,
    bench_accumulator,
    bench_config_from_yaml,
    bench_config_validate,
);
criterion_main!(benches);

//! Library-level tests for schedules and grouped retrieval metrics.
//!
//! # Test Coverage
//!
//! 1. **Hard restarts**: the 21-step cosine-with-hard-restarts trace
//! 2. **Resumption**: a schedule loaded from YAML with `last_step` continues
//!    exactly where a fresh run would be
//! 3. **Sharding**: merged per-shard partials equal a single computation,
//!    both directly and through the accumulator

use transformers_lightning_rs::metrics::{MetricKind, Scorer};
use transformers_lightning_rs::{
    EmptyTargetAction, GroupedScore, LightningConfig, LrSchedule, RetrievalAccumulator,
    RetrievalMetric, SchedulePolicy,
};

fn rel_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-4 * b.abs()
}

// ==========================================================================
// Schedule Tests
// ==========================================================================

#[test]
fn test_hard_restarts_trace() {
    let expected = [
        0.0, 0.2, 0.4, 0.6, 0.8, 1.0, 0.956772, 0.834565, 0.654508, 0.447736, 0.25, 0.095491,
        0.010926, 0.989074, 0.904508, 0.75, 0.552264, 0.345491, 0.165435, 0.043227, 0.0,
    ];
    let mut schedule = LrSchedule::new(SchedulePolicy::CosineWithHardRestarts {
        num_warmup_steps: 5,
        num_training_steps: 20,
        num_cycles: 2.0,
    })
    .unwrap();

    for (step, want) in expected.iter().enumerate() {
        let got = schedule.step();
        assert!(rel_close(got, *want), "step {step}: {got} vs {want}");
    }
}

#[test]
fn test_resume_from_yaml_matches_fresh_run() {
    let yaml = |last_step: i64| {
        format!(
            "learning_rate: 3.0e-5\nlast_step: {last_step}\nscheduler:\n  policy: cosine_with_hard_restarts\n  num_warmup_steps: 5\n  num_training_steps: 20\n  num_cycles: 2.0\n"
        )
    };

    let fresh: LightningConfig = serde_yaml::from_str(&yaml(-1)).unwrap();
    let full = fresh.build_schedule().unwrap().trace(25);

    for last_step in [0usize, 4, 5, 12, 19] {
        #[allow(clippy::cast_possible_wrap)]
        let config: LightningConfig = serde_yaml::from_str(&yaml(last_step as i64)).unwrap();
        let mut resumed = config.build_schedule().unwrap();

        for want in &full[last_step + 1..] {
            assert_eq!(resumed.step(), *want, "resumed after {last_step}");
        }
    }
}

#[test]
fn test_schedule_applies_to_layerwise_base_rates() {
    let config = LightningConfig::electra_layerwise_preset();
    let schedule = config.build_schedule().unwrap();
    let base_lrs = config.base_lrs().unwrap();

    let lrs = schedule.lrs_at(5_000, &base_lrs);
    assert_eq!(lrs.len(), base_lrs.len());
    for (lr, base) in lrs.iter().zip(&base_lrs) {
        assert!(rel_close(*lr, base * 0.5));
    }
}

// ==========================================================================
// Retrieval Metric Tests
// ==========================================================================

fn shards() -> Vec<(Vec<i64>, Vec<f64>, Vec<i64>)> {
    vec![
        (
            vec![0, 0, 0, 1, 1],
            vec![0.2, 0.3, 0.5, 0.1, 0.3],
            vec![0, 0, 1, 0, 1],
        ),
        (
            vec![2, 2, 3, 3, 3],
            vec![0.5, 0.2, 0.9, 0.4, 0.1],
            vec![0, 1, 0, 0, 0],
        ),
        (
            vec![4, 4, 4, 5],
            vec![0.7, 0.8, 0.1, 0.6],
            vec![1, -100, 0, 1],
        ),
    ]
}

fn metrics() -> Vec<RetrievalMetric> {
    [
        MetricKind::HitRate { k: 1 },
        MetricKind::Precision {
            k: 2,
            adaptive_k: true,
        },
        MetricKind::Recall { k: 2 },
        MetricKind::ReciprocalRank,
        MetricKind::AveragePrecision,
    ]
    .iter()
    .map(|kind| RetrievalMetric::from_kind(kind).unwrap())
    .collect()
}

#[test]
fn test_shard_merge_equals_single_call() {
    let shards = shards();
    let ids: Vec<i64> = shards.iter().flat_map(|s| s.0.clone()).collect();
    let preds: Vec<f64> = shards.iter().flat_map(|s| s.1.clone()).collect();
    let target: Vec<i64> = shards.iter().flat_map(|s| s.2.clone()).collect();

    for action in [
        EmptyTargetAction::Skip,
        EmptyTargetAction::Pos,
        EmptyTargetAction::Neg,
    ] {
        for metric in metrics() {
            let metric = metric.with_empty_target_action(action);

            let merged = shards
                .iter()
                .map(|(i, p, t)| metric.compute_partial(i, p, t).unwrap())
                .fold(GroupedScore::default(), GroupedScore::merge);
            let single = metric.compute_partial(&ids, &preds, &target).unwrap();

            assert_eq!(merged, single, "{} {action:?}", metric.label());
            assert!(rel_close(
                merged.value(),
                metric.compute(&ids, &preds, &target).unwrap()
            ));
        }
    }
}

#[test]
fn test_accumulator_matches_single_call() {
    let shards = shards();
    let metric = RetrievalMetric::hit_rate(1).unwrap();
    let mut acc = RetrievalAccumulator::new(metric.clone());

    let mut ids: Vec<i64> = Vec::new();
    let mut preds: Vec<f64> = Vec::new();
    let mut target: Vec<i64> = Vec::new();
    for (i, p, t) in &shards {
        acc.update(i, p, t).unwrap();
        ids.extend_from_slice(i);
        preds.extend_from_slice(p);
        target.extend_from_slice(t);
    }

    // Four hits, one miss, one query without positives skipped
    let expected = metric.compute(&ids, &preds, &target).unwrap();
    assert!(rel_close(expected, 0.8));
    assert_eq!(acc.compute().unwrap(), expected);
    assert_eq!(acc.len(), ids.len());
}

#[test]
fn test_reciprocal_rank_with_neg_policy() {
    let scorer = Scorer::ReciprocalRank(Default::default());
    let metric = RetrievalMetric::new(scorer).with_empty_target_action(EmptyTargetAction::Neg);

    let value = metric
        .compute(&["a", "a", "b", "b"], &[0.1, 0.9, 0.4, 0.6], &[true, false, false, false])
        .unwrap();
    assert!(rel_close(value, 0.25));
}

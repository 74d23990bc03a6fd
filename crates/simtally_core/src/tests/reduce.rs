//! Tests for reducing worker partials

use crate::model::{MetricAccumulator, MetricKind, ResultCollection, ResultValue};
use crate::params::SimulationParameters;
use crate::reduce::reduce_partials;

fn partial(errors: f64, reps: u64) -> ResultCollection {
    let params = SimulationParameters::new().with_fixed("snr", 5);
    let mut collection = ResultCollection::with_parameters(params);
    collection
        .add_new("errors", MetricKind::Additive, errors, None)
        .unwrap();
    collection
        .add_new("ber", MetricKind::Ratio, errors, Some(100.0))
        .unwrap();
    collection.repetition_count = Some(reps);
    collection
}

#[test]
fn test_reduce_partials_sums_everything() {
    let partials: Vec<_> = (1..=8).map(|i| partial(i as f64, 10)).collect();
    let reduced = reduce_partials(partials).unwrap();

    assert_eq!(reduced.repetition_count, Some(80));
    assert_eq!(
        reduced.last("errors").and_then(MetricAccumulator::get_result),
        Some(ResultValue::Scalar(36.0))
    );
    let ber = reduced.last("ber").unwrap();
    assert_eq!(ber.update_count(), 8);
    assert_eq!(ber.get_result(), Some(ResultValue::Scalar(0.045)));
    assert_eq!(
        reduced.parameters(),
        &SimulationParameters::new().with_fixed("snr", 5)
    );
}

#[test]
fn test_reduce_partials_skips_empty() {
    let params = SimulationParameters::new().with_fixed("snr", 5);
    let mut empty = ResultCollection::with_parameters(params);
    empty.repetition_count = Some(3);

    let reduced = reduce_partials(vec![empty, partial(2.0, 10), partial(4.0, 10)]).unwrap();
    assert_eq!(reduced.repetition_count, Some(23));
    assert_eq!(
        reduced.last("errors").and_then(MetricAccumulator::get_result),
        Some(ResultValue::Scalar(6.0))
    );
}

#[test]
fn test_reduce_nothing() {
    let reduced = reduce_partials(Vec::<ResultCollection>::new()).unwrap();
    assert!(reduced.is_empty());
    assert_eq!(reduced.repetition_count, None);
}

#[test]
fn test_reduce_propagates_merge_errors() {
    let mut odd = ResultCollection::new();
    odd.add_new("errors", MetricKind::Additive, 1.0, None).unwrap();
    odd.add_new("ber", MetricKind::Additive, 1.0, None).unwrap();

    assert!(reduce_partials(vec![partial(1.0, 1), odd]).is_err());
}

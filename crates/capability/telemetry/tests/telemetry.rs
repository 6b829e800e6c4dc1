use homepoll_telemetry::{
    PipelineMetrics, metrics, new_event_id, record_batch_published, record_frame_received,
    record_measurements_normalized,
};

#[test]
fn event_ids_are_unique() {
    let first = new_event_id();
    let second = new_event_id();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_frame_received();
    record_measurements_normalized(2);
    record_batch_published();
    let after = metrics().snapshot();

    assert!(after.frames_received >= before.frames_received + 1);
    assert!(after.measurements_normalized >= before.measurements_normalized + 2);
    assert!(after.batches_published >= before.batches_published + 1);
}

#[test]
fn fresh_metrics_start_at_zero() {
    let metrics = PipelineMetrics::new();
    assert_eq!(metrics.snapshot(), Default::default());
}

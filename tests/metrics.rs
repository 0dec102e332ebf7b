// tests/metrics.rs
use std::collections::HashMap;
use std::sync::Arc;

use keyword_window_stats::{Aggregator, EventBuffer, RateLimitSignal, StreamListener};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

#[test]
fn ingestion_and_aggregation_emit_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let buf = Arc::new(EventBuffer::new());
        let listener = StreamListener::new(buf.clone(), RateLimitSignal::new());
        listener.on_data(r#"{"timestamp_ms":"5","user":{"id":1,"name":"a"},"text":"hello world"}"#);
        listener.on_data(r#"{"timestamp_ms":"6","text":"no author"}"#);
        listener.on_data(r#"{"delete":{}}"#);
        listener.on_data("garbage");
        listener.on_error(420);

        let evs = buf.snapshot();
        let _ = Aggregator::default().compute(&evs, 10, 100);
    });

    let counters: HashMap<String, u64> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(n) => Some((key.key().name().to_string(), n)),
            _ => None,
        })
        .collect();

    assert_eq!(counters.get("ingest_events_total"), Some(&2));
    assert_eq!(counters.get("ingest_skipped_total"), Some(&1));
    assert_eq!(counters.get("ingest_invalid_total"), Some(&1));
    assert_eq!(counters.get("ingest_rate_limited_total"), Some(&1));
    assert_eq!(counters.get("aggregate_skipped_events_total"), Some(&1));
}

use metrics_exporter_prometheus::PrometheusBuilder;

// Integration test on purpose: only the public `common::observability`
// surface is exercised, the layer stack stays private.

#[test]
fn error_level_events_feed_the_error_counter() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let (dispatch, _otel_guard) = common::observability::build_dispatch("ranker-test", "info");

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!(job = "scoring_pipeline", "routine progress");
            // The counter registers lazily, so it must not exist yet.
            assert!(
                !handle.render().contains("tracing_error_events"),
                "info events must not touch the error counter"
            );

            tracing::error!(wallet = "0xw1", "leaderboard write failed");
        });
    });

    let rendered = handle.render();
    assert!(
        rendered.contains("tracing_error_events"),
        "expected tracing_error_events in rendered metrics, got:\n{rendered}"
    );
}

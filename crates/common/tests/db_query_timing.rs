use metrics_exporter_prometheus::PrometheusBuilder;

#[test]
fn call_named_times_queries_and_counts_failures() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    let rt = tokio::runtime::Runtime::new().unwrap();
    metrics::with_local_recorder(&recorder, || {
        rt.block_on(async {
            let tmp = tempfile::NamedTempFile::new().unwrap();
            let db = common::db::AsyncDb::open(tmp.path().to_str().unwrap())
                .await
                .unwrap();

            // A real query against the migrated store lands a latency sample.
            let stored: i64 = db
                .call_named("trades.count", |conn| {
                    conn.execute(
                        "INSERT INTO trades_raw (id, market_id, wallet, timestamp)
                         VALUES ('0xcafe_0', 'm1', '0xw1', 1700000000)",
                        [],
                    )?;
                    Ok(conn.query_row("SELECT COUNT(*) FROM trades_raw", [], |r| r.get(0))?)
                })
                .await
                .unwrap();
            assert_eq!(stored, 1);

            // A statement naming a missing column records status=err plus
            // one tick on the error counter.
            let err: anyhow::Result<()> = db
                .call_named("trades.bad_column", |conn| {
                    let _: i64 =
                        conn.query_row("SELECT no_such_column FROM trades_raw", [], |r| {
                            r.get(0)
                        })?;
                    Ok(())
                })
                .await;
            assert!(err.is_err());
        });
    });

    let rendered = handle.render();
    for metric in ["ranker_db_query_latency_ms", "ranker_db_query_errors_total"] {
        assert!(rendered.contains(metric), "expected {metric}, got:\n{rendered}");
    }
}

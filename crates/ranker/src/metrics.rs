use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "ranker_wallets_processed_total",
        "Wallets that cleared the trade gate and were scored."
    );
    describe_counter!(
        "ranker_wallets_skipped_total",
        "Wallets skipped because of invalid stored trades."
    );
    describe_gauge!(
        "ranker_cohort_wallets",
        "Wallets in the latest scored cohort."
    );
    describe_gauge!(
        "ranker_leaderboard_rows",
        "Rows published by the latest leaderboard refresh."
    );
    describe_counter!(
        "ranker_pipeline_runs_total",
        "Completed scoring pipeline passes."
    );
    describe_histogram!(
        "ranker_db_query_latency_ms",
        "SQLite operation latency in milliseconds."
    );
    describe_counter!(
        "ranker_db_query_errors_total",
        "SQLite operations that returned an error."
    );
}

/// Install the global Prometheus recorder and serve /metrics on `port`.
/// Must be called from inside the Tokio runtime so the exporter task
/// has something to spawn onto.
pub fn install_prometheus(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}

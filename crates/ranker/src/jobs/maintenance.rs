use anyhow::Result;
use common::db::AsyncDb;

use crate::flow_metrics;

/// Snapshot pipeline funnel counts from the database into Prometheus gauges.
pub async fn run_flow_metrics_once(db: &AsyncDb, cutoff_epoch: i64, day: &str) -> Result<()> {
    let day = day.to_owned();
    let counts = db
        .call_named("flow_metrics.compute", move |conn| {
            flow_metrics::compute_flow_counts(conn, cutoff_epoch, &day)
        })
        .await?;
    flow_metrics::record_flow_counts(&counts);
    Ok(())
}

/// Fold the WAL back into the main database file.
///
/// The scoring jobs rewrite wallet_daily and the leaderboard every cycle
/// while the collector appends trades, so without periodic checkpointing
/// the WAL grows without bound. TRUNCATE mode resets it to zero bytes
/// once every page is checkpointed.
pub async fn run_wal_checkpoint_once(db: &AsyncDb) -> Result<(i64, i64)> {
    db.call_named("wal_checkpoint.run", |conn| {
        let (busy, wal_pages, checkpointed): (i64, i64, i64) =
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;

        let status = if busy == 0 { "ok" } else { "busy" };
        metrics::counter!("ranker_wal_checkpoint_total", "status" => status).increment(1);
        metrics::gauge!("ranker_wal_checkpoint_pages").set(checkpointed as f64);

        if busy == 0 {
            tracing::info!(wal_pages, checkpointed, "WAL checkpoint complete");
        } else {
            tracing::warn!(
                wal_pages,
                checkpointed,
                "WAL checkpoint partial, a writer was holding the database"
            );
        }
        Ok((wal_pages, checkpointed))
    })
    .await
}

/// Record database size and page statistics as Prometheus gauges.
pub async fn run_sqlite_stats_once(db: &AsyncDb, db_path: &str) -> Result<()> {
    fn file_size(path: &str) -> u64 {
        std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }

    let (page_count, page_size, freelist_count) = db
        .call_named("sqlite_stats.pragmas", |conn| {
            let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
            let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
            let freelist: i64 = conn.query_row("PRAGMA freelist_count", [], |r| r.get(0))?;
            Ok((page_count, page_size, freelist))
        })
        .await?;

    // File sizes come straight from the filesystem, no database lock needed.
    let db_bytes = file_size(db_path);
    let wal_bytes = file_size(&format!("{db_path}-wal"));

    metrics::gauge!("ranker_db_file_size_bytes").set(db_bytes as f64);
    metrics::gauge!("ranker_db_wal_size_bytes").set(wal_bytes as f64);
    metrics::gauge!("ranker_db_page_count").set(page_count as f64);
    metrics::gauge!("ranker_db_page_size_bytes").set(page_size as f64);
    metrics::gauge!("ranker_db_freelist_count").set(freelist_count as f64);

    tracing::debug!(
        db_bytes,
        wal_bytes,
        page_count,
        page_size,
        freelist_count,
        "sqlite stats collected"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_sqlite_stats_records_gauges() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let rt = tokio::runtime::Runtime::new().unwrap();
        metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                let tmp = tempfile::NamedTempFile::new().unwrap();
                let path = tmp.path().to_str().unwrap();
                let db = AsyncDb::open(path).await.unwrap();

                run_sqlite_stats_once(&db, path).await.unwrap();
            });
        });

        let rendered = handle.render();
        for metric in [
            "ranker_db_file_size_bytes",
            "ranker_db_wal_size_bytes",
            "ranker_db_page_count",
            "ranker_db_page_size_bytes",
            "ranker_db_freelist_count",
        ] {
            assert!(rendered.contains(metric), "expected {metric}, got:\n{rendered}");
        }
    }

    #[test]
    fn test_flow_metrics_records_funnel_gauges() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let rt = tokio::runtime::Runtime::new().unwrap();
        metrics::with_local_recorder(&recorder, || {
            rt.block_on(async {
                let db = AsyncDb::open(":memory:").await.unwrap();
                run_flow_metrics_once(&db, 0, "2026-01-02").await.unwrap();
            });
        });

        let rendered = handle.render();
        for metric in [
            "ranker_flow_funnel_trades_stored",
            "ranker_flow_funnel_window_wallets",
            "ranker_flow_funnel_wallets_featured_today",
            "ranker_flow_funnel_wallets_flagged_today",
            "ranker_flow_funnel_leaderboard_rows_today",
        ] {
            assert!(rendered.contains(metric), "expected {metric}, got:\n{rendered}");
        }
    }
}

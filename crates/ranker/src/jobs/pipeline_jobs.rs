use anyhow::Result;
use chrono::{DateTime, Utc};
use common::config::Config;
use common::db::AsyncDb;

use crate::features;
use crate::leaderboard;
use crate::scoring::{self, ScoreWeights};

use super::tracker::JobTracker;

/// Counts from one feature-aggregation pass, also written to job_status
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureRunSummary {
    pub window_trades: usize,
    pub wallets: u64,
    pub skipped: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub window_trades: usize,
    pub wallets: u64,
    pub skipped: u32,
    pub ranked: u64,
}

/// Aggregate window features for every qualifying wallet and upsert them
/// under the day key derived from `now`.
pub async fn run_feature_aggregation_once(
    db: &AsyncDb,
    cfg: &Config,
    now: DateTime<Utc>,
) -> Result<FeatureRunSummary> {
    let tracker = JobTracker::start(db, "feature_aggregation").await?;
    match aggregate_features(db, cfg, &tracker, now).await {
        Ok(summary) => {
            tracker
                .success(Some(serde_json::json!({
                    "window_trades": summary.window_trades,
                    "wallets": summary.wallets,
                    "skipped": summary.skipped,
                })))
                .await?;
            Ok(summary)
        }
        Err(e) => {
            tracker.fail(&e).await?;
            Err(e)
        }
    }
}

async fn aggregate_features(
    db: &AsyncDb,
    cfg: &Config,
    tracker: &JobTracker,
    now: DateTime<Utc>,
) -> Result<FeatureRunSummary> {
    let cutoff = now.timestamp() - i64::from(cfg.aggregation.window_days) * 86_400;
    let day = now.format("%Y-%m-%d").to_string();

    let trades = db
        .call_named("features.read_window", move |conn| {
            features::fetch_window_trades(conn, cutoff)
        })
        .await?;
    let window_trades = trades.len();

    tracker
        .update_progress(serde_json::json!({
            "phase": "compute",
            "window_trades": window_trades,
        }))
        .await?;

    let summary = features::compute_cohort(&trades, cfg.aggregation.min_trades, &day);
    metrics::counter!("ranker_wallets_processed_total").increment(summary.rows.len() as u64);
    metrics::counter!("ranker_wallets_skipped_total").increment(u64::from(summary.skipped));
    metrics::gauge!("ranker_cohort_wallets").set(summary.rows.len() as f64);

    let skipped = summary.skipped;
    let rows = summary.rows;
    // Batch write: one transaction so a crash mid-run never leaves a
    // half-written day.
    let wallets: u64 = db
        .call_named("features.upsert_day_batch", move |conn| {
            let tx = conn.transaction()?;
            let mut n = 0_u64;
            for row in &rows {
                features::upsert_wallet_day(&tx, row)?;
                n += 1;
            }
            tx.commit()?;
            Ok(n)
        })
        .await?;

    tracing::info!(window_trades, wallets, skipped, day = %day, "feature aggregation complete");
    Ok(FeatureRunSummary {
        window_trades,
        wallets,
        skipped,
    })
}

/// Score the day's feature rows and publish the ranked leaderboard for
/// the day key derived from `now`. Returns the number of published rows.
pub async fn run_leaderboard_refresh_once(
    db: &AsyncDb,
    cfg: &Config,
    now: DateTime<Utc>,
) -> Result<u64> {
    let tracker = JobTracker::start(db, "leaderboard_refresh").await?;
    match refresh_leaderboard(db, cfg, now).await {
        Ok(ranked) => {
            tracker
                .success(Some(serde_json::json!({ "ranked": ranked })))
                .await?;
            Ok(ranked)
        }
        Err(e) => {
            tracker.fail(&e).await?;
            Err(e)
        }
    }
}

async fn refresh_leaderboard(db: &AsyncDb, cfg: &Config, now: DateTime<Utc>) -> Result<u64> {
    let day = now.format("%Y-%m-%d").to_string();
    let weights = ScoreWeights {
        roi: cfg.scoring.weights_roi,
        win_rate: cfg.scoring.weights_win_rate,
        entry_timing: cfg.scoring.weights_entry_timing,
        volume: cfg.scoring.weights_volume,
    };
    let top_n = cfg.scoring.top_n;

    let read_day = day.clone();
    let rows = db
        .call_named("leaderboard.read_day_features", move |conn| {
            features::fetch_day_features(conn, &read_day)
        })
        .await?;

    let scored = scoring::compute_smartscores(&rows, &weights);
    let entries = leaderboard::rank_wallets(scored, top_n);

    let write_day = day.clone();
    let ranked = db
        .call_named("leaderboard.replace_day", move |conn| {
            leaderboard::replace_day(conn, &write_day, &entries).map(|n| n as u64)
        })
        .await?;

    metrics::gauge!("ranker_leaderboard_rows").set(ranked as f64);
    tracing::info!(ranked, day = %day, "leaderboard refreshed");
    Ok(ranked)
}

/// One full scoring pass: window features first, then the day's leaderboard.
///
/// Both phases share the same `now` so the feature day key and the
/// leaderboard rank_date always line up, even across a UTC midnight.
pub async fn run_scoring_pipeline_once(db: &AsyncDb, cfg: &Config) -> Result<PipelineSummary> {
    let now = Utc::now();
    let features = run_feature_aggregation_once(db, cfg, now).await?;
    let ranked = run_leaderboard_refresh_once(db, cfg, now).await?;
    metrics::counter!("ranker_pipeline_runs_total").increment(1);
    Ok(PipelineSummary {
        window_trades: features.window_trades,
        wallets: features.wallets,
        skipped: features.skipped,
        ranked,
    })
}

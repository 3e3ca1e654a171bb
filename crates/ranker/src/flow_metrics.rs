use anyhow::Result;
use rusqlite::Connection;

/// Records current flow counts to Prometheus gauges (for Grafana flow panels).
pub fn record_flow_counts(counts: &FlowCounts) {
    metrics::gauge!("ranker_flow_funnel_trades_stored").set(counts.trades_stored as f64);
    metrics::gauge!("ranker_flow_funnel_window_wallets").set(counts.window_wallets as f64);
    metrics::gauge!("ranker_flow_funnel_wallets_featured_today")
        .set(counts.wallets_featured_today as f64);
    metrics::gauge!("ranker_flow_funnel_wallets_flagged_today")
        .set(counts.wallets_flagged_today as f64);
    metrics::gauge!("ranker_flow_funnel_leaderboard_rows_today")
        .set(counts.leaderboard_rows_today as f64);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowCounts {
    pub trades_stored: i64,
    /// Distinct wallets with ≥1 trade inside the aggregation window.
    pub window_wallets: i64,
    pub wallets_featured_today: i64,
    pub wallets_flagged_today: i64,
    pub leaderboard_rows_today: i64,
}

pub fn compute_flow_counts(conn: &Connection, cutoff_epoch: i64, day: &str) -> Result<FlowCounts> {
    let trades_stored: i64 =
        conn.query_row("SELECT COUNT(*) FROM trades_raw", [], |r| r.get(0))?;
    let window_wallets: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT wallet) FROM trades_raw WHERE timestamp >= ?1",
        [cutoff_epoch],
        |r| r.get(0),
    )?;
    let wallets_featured_today: i64 = conn.query_row(
        "SELECT COUNT(*) FROM wallet_daily WHERE day = ?1",
        [day],
        |r| r.get(0),
    )?;
    let wallets_flagged_today: i64 = conn.query_row(
        "SELECT COUNT(*) FROM wallet_daily WHERE day = ?1 AND insider_flag = 1",
        [day],
        |r| r.get(0),
    )?;
    let leaderboard_rows_today: i64 = conn.query_row(
        "SELECT COUNT(*) FROM leaderboard WHERE rank_date = ?1",
        [day],
        |r| r.get(0),
    )?;

    Ok(FlowCounts {
        trades_stored,
        window_wallets,
        wallets_featured_today,
        wallets_flagged_today,
        leaderboard_rows_today,
    })
}

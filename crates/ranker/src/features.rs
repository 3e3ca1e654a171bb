//! Windowed per-wallet feature aggregation over the trade store.
//!
//! One pass reads every trade inside the rolling window, folds them into
//! per-wallet accumulators, then finishes with the cohort-relative pieces
//! (entry-timing normalization and the ROI outlier flag) that can only be
//! computed once the whole cohort is known.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use common::types::TradeRecord;
use rusqlite::{Connection, OptionalExtension};

use crate::stats;

/// Cohort z-score above which a wallet's average ROI is treated as an
/// insider signal. The z is computed against the other scored wallets,
/// leaving the candidate out of the mean and deviation.
const INSIDER_COHORT_Z: f64 = 2.0;

/// One wallet_daily row: everything the scorer and leaderboard need.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletDay {
    pub wallet: String,
    pub day: String,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub avg_roi: f64,
    pub roi_std: f64,
    pub total_volume: f64,
    pub avg_ticket_size: f64,
    pub median_ticket_size: f64,
    pub unique_markets: u32,
    pub concentration_index: f64,
    pub mean_hold_time_secs: f64,
    pub max_drawdown: f64,
    pub bait_score: f64,
    pub insider_flag: bool,
    pub is_high_freq: bool,
    pub last_trade_at: i64,
}

/// A wallet whose stored trades violate the store contract is skipped;
/// the rest of the cohort still gets scored.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("non-finite {field} on trade {trade_id}")]
    NonFinite {
        trade_id: String,
        field: &'static str,
    },
}

#[derive(Debug)]
pub struct CohortSummary {
    pub rows: Vec<WalletDay>,
    pub skipped: u32,
}

/// All trades with `timestamp >= cutoff_epoch`, oldest first.
pub fn fetch_window_trades(conn: &Connection, cutoff_epoch: i64) -> Result<Vec<TradeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, market_id, wallet, outcome, side, amount_usdc, cost_usdc,
                price_before, price_after, timestamp, block_number, pool_depth
         FROM trades_raw
         WHERE timestamp >= ?1
         ORDER BY timestamp ASC, id ASC",
    )?;
    let rows = stmt
        .query_map([cutoff_epoch], map_trade_row)?
        .filter_map(std::result::Result::ok)
        .collect();
    Ok(rows)
}

/// Full trade history of a single wallet, oldest first.
pub fn fetch_wallet_trades(conn: &Connection, wallet: &str) -> Result<Vec<TradeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, market_id, wallet, outcome, side, amount_usdc, cost_usdc,
                price_before, price_after, timestamp, block_number, pool_depth
         FROM trades_raw
         WHERE wallet = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;
    let rows = stmt
        .query_map([wallet], map_trade_row)?
        .filter_map(std::result::Result::ok)
        .collect();
    Ok(rows)
}

fn map_trade_row(row: &rusqlite::Row) -> rusqlite::Result<TradeRecord> {
    Ok(TradeRecord {
        id: row.get(0)?,
        market_id: row.get(1)?,
        wallet: row.get(2)?,
        outcome: row.get(3)?,
        side: row.get(4)?,
        amount_usdc: row.get(5)?,
        cost_usdc: row.get(6)?,
        price_before: row.get(7)?,
        price_after: row.get(8)?,
        timestamp: row.get(9)?,
        block_number: row.get(10)?,
        pool_depth: row.get(11)?,
    })
}

/// Compute per-wallet features for one day key over the window's trades.
///
/// Wallets below `min_trades` are left out of the cohort entirely. The
/// market first-trade map is built from every window trade, including
/// trades of wallets that end up below the gate, so entry timing is
/// measured against the true start of activity in each market.
pub fn compute_cohort(trades: &[TradeRecord], min_trades: u32, day: &str) -> CohortSummary {
    let market_first_seen = first_seen_by_market(trades);

    let mut by_wallet: BTreeMap<&str, Vec<&TradeRecord>> = BTreeMap::new();
    for trade in trades {
        by_wallet.entry(&trade.wallet).or_default().push(trade);
    }

    let mut accums = Vec::new();
    let mut skipped = 0u32;
    for (wallet, group) in &by_wallet {
        if (group.len() as u32) < min_trades {
            continue;
        }
        match accumulate_wallet(wallet, group, &market_first_seen) {
            Ok(acc) => accums.push(acc),
            Err(err) => {
                tracing::warn!(wallet, error = %err, "skipping wallet with bad stored trades");
                skipped += 1;
            }
        }
    }

    let entry_lags: Vec<f64> = accums.iter().map(|a| a.entry_lag_secs).collect();
    let avg_rois: Vec<f64> = accums.iter().map(|a| a.avg_roi).collect();
    let lag_norm = stats::normalize(&entry_lags);

    let rows = accums
        .into_iter()
        .enumerate()
        .map(|(i, acc)| WalletDay {
            wallet: acc.wallet,
            day: day.to_string(),
            trades: acc.trades,
            wins: acc.wins,
            losses: acc.trades - acc.wins,
            win_rate: acc.win_rate,
            avg_roi: acc.avg_roi,
            total_volume: acc.total_volume,
            avg_ticket_size: acc.avg_ticket_size,
            unique_markets: acc.unique_markets,
            concentration_index: acc.concentration_index,
            bait_score: 1.0 - lag_norm[i],
            insider_flag: is_cohort_outlier(&avg_rois, i),
            last_trade_at: acc.last_trade_at,
            // These need entry/exit position matching the store cannot
            // support yet; kept at 0 so the schema stays stable.
            roi_std: 0.0,
            median_ticket_size: 0.0,
            mean_hold_time_secs: 0.0,
            max_drawdown: 0.0,
            is_high_freq: false,
        })
        .collect();

    CohortSummary { rows, skipped }
}

/// Epoch of the first window trade per market, across all wallets.
fn first_seen_by_market(trades: &[TradeRecord]) -> HashMap<String, i64> {
    let mut first_seen: HashMap<String, i64> = HashMap::new();
    for trade in trades {
        first_seen
            .entry(trade.market_id.clone())
            .and_modify(|t| *t = (*t).min(trade.timestamp))
            .or_insert(trade.timestamp);
    }
    first_seen
}

struct WalletAccum {
    wallet: String,
    trades: u32,
    wins: u32,
    win_rate: f64,
    avg_roi: f64,
    total_volume: f64,
    avg_ticket_size: f64,
    unique_markets: u32,
    concentration_index: f64,
    /// Mean seconds behind each market's first window trade.
    entry_lag_secs: f64,
    last_trade_at: i64,
}

fn accumulate_wallet(
    wallet: &str,
    trades: &[&TradeRecord],
    market_first_seen: &HashMap<String, i64>,
) -> std::result::Result<WalletAccum, FeatureError> {
    let mut rois = Vec::with_capacity(trades.len());
    let mut lags = Vec::with_capacity(trades.len());
    // A REAL written from this map's sum must not wobble between reruns,
    // so iteration order has to be fixed: float addition is order-sensitive.
    let mut volume_by_market: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total_volume = 0.0;
    let mut last_trade_at = i64::MIN;

    for trade in trades {
        ensure_finite(trade, "amount_usdc", trade.amount_usdc)?;
        ensure_finite(trade, "price_before", trade.price_before)?;
        ensure_finite(trade, "price_after", trade.price_after)?;

        let pb = trade.price_before.unwrap_or(0.0);
        let pa = trade.price_after.unwrap_or(0.0);
        // A market trading at exactly 0 has no meaningful base price;
        // the raw move stands in for the return.
        let denom = if pb.abs() > 0.0 { pb } else { 1.0 };
        rois.push((pa - pb) / denom);

        let notional = trade.notional();
        total_volume += notional;
        *volume_by_market.entry(trade.market_id.as_str()).or_insert(0.0) += notional;

        let first = market_first_seen
            .get(&trade.market_id)
            .copied()
            .unwrap_or(trade.timestamp);
        lags.push((trade.timestamp - first) as f64);

        last_trade_at = last_trade_at.max(trade.timestamp);
    }

    let n = trades.len() as f64;
    let wins = rois.iter().filter(|r| **r > 0.0).count() as u32;
    let hhi_denom = total_volume.max(1e-9);
    let concentration_index = volume_by_market
        .values()
        .map(|v| (v / hhi_denom).powi(2))
        .sum();

    Ok(WalletAccum {
        wallet: wallet.to_string(),
        trades: trades.len() as u32,
        wins,
        win_rate: f64::from(wins) / n,
        avg_roi: stats::mean(&rois),
        total_volume,
        avg_ticket_size: total_volume / n,
        unique_markets: volume_by_market.len() as u32,
        concentration_index,
        entry_lag_secs: stats::mean(&lags),
        last_trade_at,
    })
}

fn ensure_finite(
    trade: &TradeRecord,
    field: &'static str,
    value: Option<f64>,
) -> std::result::Result<(), FeatureError> {
    match value {
        Some(v) if !v.is_finite() => Err(FeatureError::NonFinite {
            trade_id: trade.id.clone(),
            field,
        }),
        _ => Ok(()),
    }
}

/// Leave-one-out outlier test on average ROI. Cohorts of one or two
/// wallets are never flagged, and neither is a cohort whose remaining
/// wallets all share the same ROI.
fn is_cohort_outlier(avg_rois: &[f64], i: usize) -> bool {
    if avg_rois.len() < 3 {
        return false;
    }
    let others: Vec<f64> = avg_rois
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, v)| *v)
        .collect();
    let m = stats::mean(&others);
    let s = stats::sample_std(&others);
    if s <= 0.0 {
        return false;
    }
    (avg_rois[i] - m) / s > INSIDER_COHORT_Z
}

/// Insert or update one wallet_daily row.
pub fn upsert_wallet_day(conn: &Connection, row: &WalletDay) -> Result<()> {
    conn.execute(
        "INSERT INTO wallet_daily (
            wallet, day, trades, wins, losses, win_rate, avg_roi, roi_std,
            total_volume, avg_ticket_size, median_ticket_size, unique_markets,
            concentration_index, mean_hold_time_secs, max_drawdown, bait_score,
            insider_flag, is_high_freq, last_trade_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        ON CONFLICT(wallet, day) DO UPDATE SET
            trades = excluded.trades,
            wins = excluded.wins,
            losses = excluded.losses,
            win_rate = excluded.win_rate,
            avg_roi = excluded.avg_roi,
            roi_std = excluded.roi_std,
            total_volume = excluded.total_volume,
            avg_ticket_size = excluded.avg_ticket_size,
            median_ticket_size = excluded.median_ticket_size,
            unique_markets = excluded.unique_markets,
            concentration_index = excluded.concentration_index,
            mean_hold_time_secs = excluded.mean_hold_time_secs,
            max_drawdown = excluded.max_drawdown,
            bait_score = excluded.bait_score,
            insider_flag = excluded.insider_flag,
            is_high_freq = excluded.is_high_freq,
            last_trade_at = excluded.last_trade_at,
            updated_at = datetime('now')",
        rusqlite::params![
            row.wallet,
            row.day,
            row.trades,
            row.wins,
            row.losses,
            row.win_rate,
            row.avg_roi,
            row.roi_std,
            row.total_volume,
            row.avg_ticket_size,
            row.median_ticket_size,
            row.unique_markets,
            row.concentration_index,
            row.mean_hold_time_secs,
            row.max_drawdown,
            row.bait_score,
            row.insider_flag,
            row.is_high_freq,
            row.last_trade_at,
        ],
    )?;
    Ok(())
}

/// All wallet_daily rows for one day key, wallet ascending. The fixed
/// order keeps downstream ranking stable when scores tie.
pub fn fetch_day_features(conn: &Connection, day: &str) -> Result<Vec<WalletDay>> {
    let mut stmt = conn.prepare(
        "SELECT wallet, day, trades, wins, losses, win_rate, avg_roi, roi_std,
                total_volume, avg_ticket_size, median_ticket_size, unique_markets,
                concentration_index, mean_hold_time_secs, max_drawdown, bait_score,
                insider_flag, is_high_freq, last_trade_at
         FROM wallet_daily
         WHERE day = ?1
         ORDER BY wallet ASC",
    )?;
    let rows = stmt
        .query_map([day], map_feature_row)?
        .filter_map(std::result::Result::ok)
        .collect();
    Ok(rows)
}

/// Newest wallet_daily row for one wallet, if it was ever featured.
pub fn fetch_latest_wallet_features(
    conn: &Connection,
    wallet: &str,
) -> Result<Option<WalletDay>> {
    let row = conn
        .query_row(
            "SELECT wallet, day, trades, wins, losses, win_rate, avg_roi, roi_std,
                    total_volume, avg_ticket_size, median_ticket_size, unique_markets,
                    concentration_index, mean_hold_time_secs, max_drawdown, bait_score,
                    insider_flag, is_high_freq, last_trade_at
             FROM wallet_daily
             WHERE wallet = ?1
             ORDER BY day DESC
             LIMIT 1",
            [wallet],
            map_feature_row,
        )
        .optional()?;
    Ok(row)
}

fn map_feature_row(row: &rusqlite::Row) -> rusqlite::Result<WalletDay> {
    Ok(WalletDay {
        wallet: row.get(0)?,
        day: row.get(1)?,
        trades: row.get(2)?,
        wins: row.get(3)?,
        losses: row.get(4)?,
        win_rate: row.get(5)?,
        avg_roi: row.get(6)?,
        roi_std: row.get(7)?,
        total_volume: row.get(8)?,
        avg_ticket_size: row.get(9)?,
        median_ticket_size: row.get(10)?,
        unique_markets: row.get(11)?,
        concentration_index: row.get(12)?,
        mean_hold_time_secs: row.get(13)?,
        max_drawdown: row.get(14)?,
        bait_score: row.get(15)?,
        insider_flag: row.get(16)?,
        is_high_freq: row.get(17)?,
        last_trade_at: row.get::<_, Option<i64>>(18)?.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::db::Database;

    fn mk_trade(
        id: &str,
        wallet: &str,
        market: &str,
        price_before: f64,
        price_after: f64,
        amount: f64,
        timestamp: i64,
    ) -> TradeRecord {
        TradeRecord {
            id: id.to_string(),
            market_id: market.to_string(),
            wallet: wallet.to_string(),
            outcome: None,
            side: Some("BUY".to_string()),
            amount_usdc: Some(amount),
            cost_usdc: None,
            price_before: Some(price_before),
            price_after: Some(price_after),
            timestamp,
            block_number: None,
            pool_depth: None,
        }
    }

    /// Five winning trades in one market, enough to pass the default gate.
    fn five_flat_trades(wallet: &str, market: &str, roi: f64, start_ts: i64) -> Vec<TradeRecord> {
        (0..5)
            .map(|i| {
                mk_trade(
                    &format!("{wallet}_{i}"),
                    wallet,
                    market,
                    1.0,
                    1.0 + roi,
                    100.0,
                    start_ts + i,
                )
            })
            .collect()
    }

    #[test]
    fn test_min_trades_gate() {
        let mut trades = five_flat_trades("0xa", "m1", 0.1, 1_000);
        // 0xb has four trades: below the gate of five.
        for i in 0..4 {
            trades.push(mk_trade(&format!("b{i}"), "0xb", "m1", 1.0, 1.1, 50.0, 2_000 + i));
        }
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        assert_eq!(summary.rows.len(), 1);
        assert_eq!(summary.rows[0].wallet, "0xa");
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn test_win_counts_and_concentration() {
        // Six trades, four up-moves, split evenly over two markets.
        let mut trades = Vec::new();
        let moves = [0.1, 0.2, 0.05, 0.15, -0.1, -0.2];
        for (i, mv) in moves.iter().enumerate() {
            let market = if i % 2 == 0 { "m1" } else { "m2" };
            trades.push(mk_trade(
                &format!("t{i}"),
                "0xa",
                market,
                0.5,
                0.5 + mv,
                100.0,
                1_000 + i as i64,
            ));
        }
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        let row = &summary.rows[0];
        assert_eq!(row.trades, 6);
        assert_eq!(row.wins, 4);
        assert_eq!(row.losses, 2);
        assert!((row.win_rate - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(row.unique_markets, 2);
        // Two equal-volume markets: HHI = 0.5^2 + 0.5^2.
        assert!((row.concentration_index - 0.5).abs() < 1e-9);
        assert_eq!(row.total_volume, 600.0);
        assert_eq!(row.avg_ticket_size, 100.0);
        assert_eq!(row.last_trade_at, 1_005);
    }

    #[test]
    fn test_roi_uses_unit_denominator_at_zero_price() {
        let trades: Vec<TradeRecord> = (0..5)
            .map(|i| mk_trade(&format!("t{i}"), "0xa", "m1", 0.0, 0.3, 10.0, 1_000 + i))
            .collect();
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        // (0.3 - 0.0) / 1.0, not a division by zero.
        assert!((summary.rows[0].avg_roi - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_single_market_concentration_is_one() {
        let trades = five_flat_trades("0xa", "m1", 0.1, 1_000);
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        assert!((summary.rows[0].concentration_index - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_concentration_index_is_bitwise_stable_across_reruns() {
        // Volumes spanning orders of magnitude make the HHI sum sensitive
        // to addition order; reruns must still write the exact same REAL.
        let mut trades = Vec::new();
        for i in 0i32..28 {
            let volume = 10f64.powi(i % 7) * (1.0 + f64::from(i) * 0.017);
            trades.push(mk_trade(
                &format!("t{i}"),
                "0xa",
                &format!("m{i}"),
                0.4,
                0.5,
                volume,
                1_000 + i64::from(i),
            ));
        }

        let first = compute_cohort(&trades, 5, "2026-08-23").rows[0]
            .concentration_index
            .to_bits();
        for _ in 0..300 {
            let rerun = compute_cohort(&trades, 5, "2026-08-23").rows[0]
                .concentration_index
                .to_bits();
            assert_eq!(rerun, first);
        }
    }

    #[test]
    fn test_bait_score_rewards_early_entries() {
        // m1 opens at t=1000; three wallets enter 0s, 1800s and 3600s later.
        let mut trades = Vec::new();
        for (w, offset) in [("0xearly", 0i64), ("0xmid", 1_800), ("0xlate", 3_600)] {
            for i in 0..5 {
                trades.push(mk_trade(
                    &format!("{w}_{i}"),
                    w,
                    "m1",
                    0.5,
                    0.6,
                    100.0,
                    1_000 + offset + i,
                ));
            }
        }
        // Force m1's first seen to exactly t=1000 regardless of ordering.
        trades.sort_by_key(|t| t.timestamp);

        let summary = compute_cohort(&trades, 5, "2026-08-23");
        let bait = |w: &str| {
            summary
                .rows
                .iter()
                .find(|r| r.wallet == w)
                .map(|r| r.bait_score)
                .unwrap()
        };
        assert!(bait("0xearly") > bait("0xmid"));
        assert!(bait("0xmid") > bait("0xlate"));
        assert!(bait("0xearly") > 0.99);
        assert!(bait("0xlate") < 0.01);
    }

    #[test]
    fn test_entry_timing_counts_trades_below_the_gate() {
        // 0xlurk opens m1 at t=1000 with a single trade (below the gate),
        // 0xa enters m1 10s later, 0xb opens m2 itself. If the lurker's
        // trade were ignored, both scored wallets would have zero lag and
        // equal bait scores.
        let mut trades = vec![mk_trade("lurk0", "0xlurk", "m1", 0.5, 0.6, 10.0, 1_000)];
        for i in 0..5 {
            trades.push(mk_trade(&format!("a{i}"), "0xa", "m1", 0.5, 0.6, 10.0, 1_010 + i));
            trades.push(mk_trade(&format!("b{i}"), "0xb", "m2", 0.5, 0.6, 10.0, 2_000 + i));
        }
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        assert_eq!(summary.rows.len(), 2);
        let a = summary.rows.iter().find(|r| r.wallet == "0xa").unwrap();
        let b = summary.rows.iter().find(|r| r.wallet == "0xb").unwrap();
        assert!(a.bait_score < b.bait_score);
    }

    #[test]
    fn test_cohort_outlier_flags_only_extreme_roi() {
        let mut trades = five_flat_trades("0xa", "m1", 0.01, 1_000);
        trades.extend(five_flat_trades("0xb", "m2", 0.02, 1_100));
        trades.extend(five_flat_trades("0xc", "m3", 0.50, 1_200));
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        let flagged: Vec<&str> = summary
            .rows
            .iter()
            .filter(|r| r.insider_flag)
            .map(|r| r.wallet.as_str())
            .collect();
        assert_eq!(flagged, vec!["0xc"]);
    }

    #[test]
    fn test_no_insider_flag_in_two_wallet_cohort() {
        let mut trades = five_flat_trades("0xa", "m1", 0.01, 1_000);
        trades.extend(five_flat_trades("0xb", "m2", 0.90, 1_100));
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        assert!(summary.rows.iter().all(|r| !r.insider_flag));
    }

    #[test]
    fn test_no_insider_flag_without_cohort_variance() {
        let mut trades = Vec::new();
        for (i, w) in ["0xa", "0xb", "0xc", "0xd"].iter().enumerate() {
            trades.extend(five_flat_trades(w, &format!("m{i}"), 0.05, 1_000 + i as i64 * 100));
        }
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        assert!(summary.rows.iter().all(|r| !r.insider_flag));
    }

    #[test]
    fn test_nonfinite_trade_skips_wallet_not_cohort() {
        let mut trades = five_flat_trades("0xok", "m1", 0.1, 1_000);
        let mut bad = five_flat_trades("0xbad", "m2", 0.1, 1_100);
        bad[2].amount_usdc = Some(f64::INFINITY);
        trades.extend(bad);

        let summary = compute_cohort(&trades, 5, "2026-08-23");
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.rows.len(), 1);
        assert_eq!(summary.rows[0].wallet, "0xok");
    }

    #[test]
    fn test_missing_numerics_default_to_zero() {
        let mut trades = five_flat_trades("0xa", "m1", 0.1, 1_000);
        for t in &mut trades {
            t.amount_usdc = None;
        }
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        let row = &summary.rows[0];
        assert_eq!(row.total_volume, 0.0);
        assert_eq!(row.avg_ticket_size, 0.0);
        // Zero volume still yields a defined concentration index.
        assert!(row.concentration_index.is_finite());
    }

    #[test]
    fn test_fetch_window_trades_applies_cutoff() {
        let db = Database::open(":memory:").unwrap();
        db.run_migrations().unwrap();
        for (id, ts) in [("old_0", 100i64), ("in_0", 5_000), ("in_1", 6_000)] {
            db.conn
                .execute(
                    "INSERT INTO trades_raw (id, market_id, wallet, timestamp)
                     VALUES (?1, 'm1', '0xa', ?2)",
                    rusqlite::params![id, ts],
                )
                .unwrap();
        }
        let trades = fetch_window_trades(&db.conn, 5_000).unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(|t| t.timestamp >= 5_000));
    }

    #[test]
    fn test_fetch_wallet_trades_is_sorted() {
        let db = Database::open(":memory:").unwrap();
        db.run_migrations().unwrap();
        for (id, ts) in [("t2", 3_000i64), ("t0", 1_000), ("t1", 2_000)] {
            db.conn
                .execute(
                    "INSERT INTO trades_raw (id, market_id, wallet, timestamp)
                     VALUES (?1, 'm1', '0xa', ?2)",
                    rusqlite::params![id, ts],
                )
                .unwrap();
        }
        db.conn
            .execute(
                "INSERT INTO trades_raw (id, market_id, wallet, timestamp)
                 VALUES ('other', 'm1', '0xb', 500)",
                [],
            )
            .unwrap();
        let trades = fetch_wallet_trades(&db.conn, "0xa").unwrap();
        assert_eq!(trades.len(), 3);
        assert!(trades.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_upsert_wallet_day_is_idempotent_per_key() {
        let db = Database::open(":memory:").unwrap();
        db.run_migrations().unwrap();

        let trades = five_flat_trades("0xa", "m1", 0.1, 1_000);
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        let mut row = summary.rows[0].clone();

        upsert_wallet_day(&db.conn, &row).unwrap();
        row.win_rate = 0.25;
        upsert_wallet_day(&db.conn, &row).unwrap();

        let (count, win_rate): (i64, f64) = db
            .conn
            .query_row(
                "SELECT COUNT(*), MAX(win_rate) FROM wallet_daily WHERE wallet='0xa'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert!((win_rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_fetch_day_features_roundtrip_ordered() {
        let db = Database::open(":memory:").unwrap();
        db.run_migrations().unwrap();

        let mut trades = five_flat_trades("0xbb", "m1", 0.1, 1_000);
        trades.extend(five_flat_trades("0xaa", "m2", 0.2, 1_100));
        let summary = compute_cohort(&trades, 5, "2026-08-23");
        for row in &summary.rows {
            upsert_wallet_day(&db.conn, row).unwrap();
        }

        let rows = fetch_day_features(&db.conn, "2026-08-23").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].wallet, "0xaa");
        assert_eq!(rows[1].wallet, "0xbb");
        assert!(fetch_day_features(&db.conn, "1999-01-01").unwrap().is_empty());

        // Round trip preserves the computed features.
        let original = summary.rows.iter().find(|r| r.wallet == "0xaa").unwrap();
        let loaded = &rows[0];
        assert_eq!(loaded.trades, original.trades);
        assert!((loaded.avg_roi - original.avg_roi).abs() < 1e-12);
        assert!((loaded.bait_score - original.bait_score).abs() < 1e-12);
        assert_eq!(loaded.insider_flag, original.insider_flag);
    }

    #[test]
    fn test_fetch_latest_wallet_features_picks_newest_day() {
        let db = Database::open(":memory:").unwrap();
        db.run_migrations().unwrap();

        let trades = five_flat_trades("0xa", "m1", 0.1, 1_000);
        for day in ["2026-08-21", "2026-08-23", "2026-08-22"] {
            let summary = compute_cohort(&trades, 5, day);
            upsert_wallet_day(&db.conn, &summary.rows[0]).unwrap();
        }

        let latest = fetch_latest_wallet_features(&db.conn, "0xa")
            .unwrap()
            .unwrap();
        assert_eq!(latest.day, "2026-08-23");
        assert!(fetch_latest_wallet_features(&db.conn, "0xnone")
            .unwrap()
            .is_none());
    }
}

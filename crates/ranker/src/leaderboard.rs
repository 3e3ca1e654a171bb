//! Ranking and atomic publication of the daily leaderboard.

use anyhow::Result;
use rusqlite::Connection;

use crate::scoring::{ScoreReasons, ScoredWallet};

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub wallet: String,
    pub smartscore: f64,
    pub reasons: ScoreReasons,
}

/// Order by SmartScore descending and keep the top `top_n`.
///
/// The sort is stable, so equal scores keep their input order; callers
/// pass wallets in ascending-address order to make ties deterministic.
pub fn rank_wallets(mut scored: Vec<ScoredWallet>, top_n: usize) -> Vec<LeaderboardEntry> {
    scored.sort_by(|a, b| {
        b.smartscore
            .partial_cmp(&a.smartscore)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_n);
    scored
        .into_iter()
        .enumerate()
        .map(|(i, s)| LeaderboardEntry {
            rank: (i + 1) as u32,
            wallet: s.wallet,
            smartscore: s.smartscore,
            reasons: s.reasons,
        })
        .collect()
}

/// Replace the published rows for `rank_date` in one transaction.
///
/// Delete plus insert, never update in place: a rerun with a smaller
/// cohort must not leave stale ranks behind from the earlier run.
pub fn replace_day(
    conn: &mut Connection,
    rank_date: &str,
    entries: &[LeaderboardEntry],
) -> Result<usize> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM leaderboard WHERE rank_date = ?1", [rank_date])?;
    for entry in entries {
        let reasons = serde_json::to_string(&entry.reasons)?;
        tx.execute(
            "INSERT INTO leaderboard (rank_date, rank, wallet, smartscore, reasons)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                rank_date,
                entry.rank,
                entry.wallet,
                entry.smartscore,
                reasons
            ],
        )?;
    }
    tx.commit()?;
    Ok(entries.len())
}

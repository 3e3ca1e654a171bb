//! Composite SmartScore over one day's scored cohort.
//!
//! Scores are cohort-relative: average ROI and recent volume are
//! winsorized min-max normalized against the rest of the day's cohort,
//! while win rate and entry timing enter raw since both already live in
//! [0, 1]. With the default weights a score lands in [0, 100].

use serde::Serialize;

use crate::features::WalletDay;
use crate::stats;

#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub roi: f64,
    pub win_rate: f64,
    pub entry_timing: f64,
    pub volume: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            roi: 0.40,
            win_rate: 0.30,
            entry_timing: 0.20,
            volume: 0.10,
        }
    }
}

/// Unnormalized inputs behind a score, published next to the rank so a
/// reader can see why a wallet placed where it did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreReasons {
    pub win_rate: f64,
    pub avg_roi: f64,
    pub entry_timing: f64,
    pub recent_volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredWallet {
    pub wallet: String,
    pub smartscore: f64,
    pub reasons: ScoreReasons,
}

/// Score every row of the cohort. Input order is preserved, so callers
/// that pass rows in wallet order get deterministic tie-breaks later.
pub fn compute_smartscores(rows: &[WalletDay], weights: &ScoreWeights) -> Vec<ScoredWallet> {
    let rois: Vec<f64> = rows.iter().map(|r| r.avg_roi).collect();
    let volumes: Vec<f64> = rows.iter().map(|r| r.total_volume).collect();
    let roi_norm = stats::normalize(&rois);
    let vol_norm = stats::normalize(&volumes);

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let smartscore = 100.0
                * (weights.roi * roi_norm[i]
                    + weights.win_rate * row.win_rate
                    + weights.entry_timing * row.bait_score
                    + weights.volume * vol_norm[i]);
            ScoredWallet {
                wallet: row.wallet.clone(),
                smartscore,
                reasons: ScoreReasons {
                    win_rate: row.win_rate,
                    avg_roi: row.avg_roi,
                    entry_timing: row.bait_score,
                    recent_volume: row.total_volume,
                },
            }
        })
        .collect()
}

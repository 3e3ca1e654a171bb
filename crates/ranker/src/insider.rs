//! Pre-event volume anomaly detection for a single wallet.
//!
//! Compares the wallet's traded volume in the hours right before an
//! event against its own daily baseline from an earlier period. The
//! baseline period ends `baseline_days` before the event, so the run-up
//! being tested never feeds the baseline it is compared against.

use chrono::{DateTime, Utc};
use common::types::TradeRecord;

use crate::stats;

#[derive(Debug, Clone, Copy)]
pub struct InsiderConfig {
    pub window_hours: u32,
    pub baseline_days: u32,
    pub zscore_threshold: f64,
}

impl Default for InsiderConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            baseline_days: 30,
            zscore_threshold: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeAnomaly {
    pub pre_volume: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub zscore: f64,
    pub flagged: bool,
}

/// Score the wallet's pre-event volume against its daily baseline.
///
/// Degenerate baselines fall back instead of erroring: no baseline days
/// means mean 0, fewer than two days (or zero variance) means a unit
/// standard deviation, so the z-score degrades to a raw volume delta.
pub fn detect_volume_anomaly(
    trades: &[TradeRecord],
    event_time: DateTime<Utc>,
    cfg: &InsiderConfig,
) -> VolumeAnomaly {
    let event_epoch = event_time.timestamp();
    let pre_start = event_epoch - i64::from(cfg.window_hours) * 3_600;
    let baseline_len = i64::from(cfg.baseline_days) * 86_400;
    let baseline_end = event_epoch - baseline_len;
    let baseline_start = baseline_end - baseline_len;

    let mut pre_volume = 0.0;
    let mut daily: std::collections::BTreeMap<i64, f64> = std::collections::BTreeMap::new();
    for trade in trades {
        let ts = trade.timestamp;
        if ts >= pre_start && ts < event_epoch {
            pre_volume += trade.notional();
        } else if ts >= baseline_start && ts < baseline_end {
            // Bucket by UTC calendar day.
            *daily.entry(ts.div_euclid(86_400)).or_insert(0.0) += trade.notional();
        }
    }

    let day_volumes: Vec<f64> = daily.values().copied().collect();
    let baseline_mean = stats::mean(&day_volumes);
    let baseline_std = if day_volumes.len() < 2 {
        1.0
    } else {
        stats::sample_std(&day_volumes)
    };

    let denom = if baseline_std > 0.0 { baseline_std } else { 1.0 };
    let zscore = (pre_volume - baseline_mean) / denom;

    VolumeAnomaly {
        pre_volume,
        baseline_mean,
        baseline_std,
        zscore,
        flagged: zscore > cfg.zscore_threshold,
    }
}

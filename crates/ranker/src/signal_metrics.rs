//! Pure signal-quality metrics attached to trades of ranked wallets.
//!
//! Everything here is arithmetic over already-computed features; no I/O,
//! so downstream publishers can call it on every trade they emit.

use chrono::{DateTime, Utc};
use common::types::RiskLevel;
use serde::Serialize;

/// A trade by a ranked wallet, as handed to downstream publishers.
#[derive(Debug, Clone)]
pub struct SignalTrade {
    pub wallet: String,
    pub market_name: String,
    pub side: String,
    pub amount_usdc: f64,
    pub timestamp: DateTime<Utc>,
    pub smartscore: f64,
    pub entry_timing: f64,
    pub rank: Option<u32>,
}

/// Feature snapshot of the signalling wallet (its wallet_daily row).
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletSnapshot {
    pub win_rate: f64,
    pub avg_roi: f64,
    pub roi_std: f64,
    pub total_volume: f64,
    pub trades: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalMetrics {
    pub alpha: f64,
    pub confidence: f64,
    pub strength: f64,
    pub risk: RiskLevel,
    pub target_roi: f64,
}

/// Score-weighted entry timing, floored at 0.
pub fn alpha_index(smartscore: f64, entry_timing: f64) -> f64 {
    ((smartscore / 100.0) * entry_timing).max(0.0)
}

/// Blend of win rate and half-weighted entry timing, in [0, 1].
pub fn confidence(win_rate: f64, entry_timing: f64) -> f64 {
    ((win_rate + entry_timing * 0.5) / 1.5).clamp(0.0, 1.0)
}

/// SmartScore and win rate blended onto a 0-100 scale.
pub fn strength(smartscore: f64, win_rate: f64) -> f64 {
    (smartscore * 0.6 + win_rate * 100.0 * 0.4).clamp(0.0, 100.0)
}

/// Volatility bucket from the wallet's ROI standard deviation.
pub fn risk_level(roi_std: f64) -> RiskLevel {
    if roi_std < 0.05 {
        RiskLevel::Low
    } else if roi_std < 0.15 {
        RiskLevel::Moderate
    } else {
        RiskLevel::High
    }
}

/// Projected ROI: the wallet's historical average with a 20% uplift.
/// Both sides are fractions, not percentages.
pub fn target_roi(avg_roi: f64) -> f64 {
    avg_roi * 1.2
}

pub fn compute(trade: &SignalTrade, snapshot: &WalletSnapshot) -> SignalMetrics {
    SignalMetrics {
        alpha: alpha_index(trade.smartscore, trade.entry_timing),
        confidence: confidence(snapshot.win_rate, trade.entry_timing),
        strength: strength(trade.smartscore, snapshot.win_rate),
        risk: risk_level(snapshot.roi_std),
        target_roi: target_roi(snapshot.avg_roi),
    }
}

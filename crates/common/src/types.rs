use serde::Serialize;

/// One row of the collector's `trades_raw` store.
///
/// Numeric columns are nullable at the store level; downstream math
/// treats a missing value as 0. `timestamp` is unix epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub id: String,
    pub market_id: String,
    pub wallet: String,
    pub outcome: Option<String>,
    pub side: Option<String>,
    pub amount_usdc: Option<f64>,
    pub cost_usdc: Option<f64>,
    pub price_before: Option<f64>,
    pub price_after: Option<f64>,
    pub timestamp: i64,
    pub block_number: Option<i64>,
    pub pool_depth: Option<f64>,
}

impl TradeRecord {
    /// USDC notional of the trade, 0 when the collector recorded none.
    pub fn notional(&self) -> f64 {
        self.amount_usdc.unwrap_or(0.0)
    }
}

/// Volatility bucket derived from a wallet's ROI standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

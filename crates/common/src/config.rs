use anyhow::Result;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub database: Database,
    pub aggregation: Aggregation,
    pub insider: Insider,
    pub scoring: Scoring,
    pub observability: Observability,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Aggregation {
    pub window_days: u32,
    pub min_trades: u32,
}

#[derive(Debug, Deserialize)]
pub struct Insider {
    pub window_hours: u32,
    pub baseline_days: u32,
    pub zscore_threshold: f64,
}

#[derive(Debug, Deserialize)]
pub struct Scoring {
    pub weights_roi: f64,
    pub weights_win_rate: f64,
    pub weights_entry_timing: f64,
    pub weights_volume: f64,
    pub top_n: usize,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Observability {
    pub prometheus_port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string("config/default.toml")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

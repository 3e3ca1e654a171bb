use anyhow::Result;
use chrono::{DateTime, Utc};
use common::config::Config;
use common::db::Database;
use rusqlite::OptionalExtension;

use crate::features;
use crate::insider::{self, InsiderConfig};
use crate::signal_metrics::{self, SignalTrade, WalletSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    RunOnce,
    Leaderboard,
    Wallet { address: String },
    Insider { address: String },
    Signal { address: String },
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let Some(cmd) = args.next() else {
        return Ok(Command::Run);
    };

    match cmd.as_str() {
        "run" => Ok(Command::Run),
        "run-once" => Ok(Command::RunOnce),
        "leaderboard" => Ok(Command::Leaderboard),
        "wallet" => {
            let address = args
                .next()
                .ok_or_else(|| "usage: ranker wallet <address>".to_string())?;
            Ok(Command::Wallet { address })
        }
        "insider" => {
            let address = args
                .next()
                .ok_or_else(|| "usage: ranker insider <address>".to_string())?;
            Ok(Command::Insider { address })
        }
        "signal" => {
            let address = args
                .next()
                .ok_or_else(|| "usage: ranker signal <address>".to_string())?;
            Ok(Command::Signal { address })
        }
        other => Err(format!("unknown command: {other}")),
    }
}

pub fn run_command(db: &Database, cfg: &Config, cmd: Command) -> Result<()> {
    match cmd {
        // Both handled in main: Run starts the daemon, RunOnce needs the
        // async pipeline.
        Command::Run | Command::RunOnce => Ok(()),
        Command::Leaderboard => show_leaderboard(db),
        Command::Wallet { address } => show_wallet(db, &address),
        Command::Insider { address } => show_insider(db, cfg, &address),
        Command::Signal { address } => show_signal(db, &address),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub rank: i64,
    pub wallet: String,
    pub smartscore: f64,
    pub reasons: Option<String>,
}

pub fn query_leaderboard_today(db: &Database) -> Result<Vec<LeaderboardRow>> {
    let mut stmt = db.conn.prepare(
        "SELECT rank, wallet, smartscore, reasons
         FROM leaderboard
         WHERE rank_date = date('now')
         ORDER BY rank ASC
         LIMIT 20",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(LeaderboardRow {
            rank: row.get(0)?,
            wallet: row.get(1)?,
            smartscore: row.get(2)?,
            reasons: row.get(3)?,
        })
    })?;
    Ok(rows.filter_map(std::result::Result::ok).collect())
}

fn show_leaderboard(db: &Database) -> Result<()> {
    println!("Leaderboard (today, top 20):");
    for r in query_leaderboard_today(db)? {
        println!("{:>3}  {:>7.2}  {}", r.rank, r.smartscore, r.wallet);
    }
    Ok(())
}

fn show_wallet(db: &Database, address: &str) -> Result<()> {
    println!("Wallet: {address}");

    let trades: i64 = db.conn.query_row(
        "SELECT COUNT(*) FROM trades_raw WHERE wallet = ?1",
        rusqlite::params![address],
        |row| row.get(0),
    )?;
    println!("  trades_raw rows={trades}");

    let Some(f) = features::fetch_latest_wallet_features(&db.conn, address)? else {
        println!("  (no feature rows yet)");
        return Ok(());
    };
    println!(
        "  day={}  trades={}  wins={}  losses={}",
        f.day, f.trades, f.wins, f.losses
    );
    println!(
        "  win_rate={:.3}  avg_roi={:.4}  volume_usdc={:.2}",
        f.win_rate, f.avg_roi, f.total_volume
    );
    println!(
        "  markets={}  concentration={:.3}  entry_timing={:.3}  insider_flag={}",
        f.unique_markets, f.concentration_index, f.bait_score, f.insider_flag
    );

    let ranked: Option<(i64, f64)> = db
        .conn
        .query_row(
            "SELECT rank, smartscore
             FROM leaderboard
             WHERE wallet = ?1
             ORDER BY rank_date DESC, rank ASC
             LIMIT 1",
            rusqlite::params![address],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match ranked {
        Some((rank, score)) => println!("  leaderboard rank={rank}  smartscore={score:.2}"),
        None => println!("  (not on the leaderboard)"),
    }

    Ok(())
}

fn show_insider(db: &Database, cfg: &Config, address: &str) -> Result<()> {
    let trades = features::fetch_wallet_trades(&db.conn, address)?;
    let icfg = InsiderConfig {
        window_hours: cfg.insider.window_hours,
        baseline_days: cfg.insider.baseline_days,
        zscore_threshold: cfg.insider.zscore_threshold,
    };
    let a = insider::detect_volume_anomaly(&trades, Utc::now(), &icfg);

    println!(
        "Insider check: {address} (last {}h vs daily baseline)",
        icfg.window_hours
    );
    println!("  trades={}  pre_volume={:.2}", trades.len(), a.pre_volume);
    println!(
        "  baseline_mean={:.2}  baseline_std={:.2}",
        a.baseline_mean, a.baseline_std
    );
    println!("  zscore={:.2}  flagged={}", a.zscore, a.flagged);
    Ok(())
}

/// Store-backed inputs for the signal formatter: the wallet's newest
/// trade, its newest feature row, and the leaderboard rank if any.
pub fn build_signal(
    db: &Database,
    address: &str,
) -> Result<Option<(SignalTrade, WalletSnapshot)>> {
    let newest: Option<(String, Option<String>, Option<f64>, i64)> = db
        .conn
        .query_row(
            "SELECT market_id, side, amount_usdc, timestamp
             FROM trades_raw
             WHERE wallet = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT 1",
            rusqlite::params![address],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;
    let Some((market_id, side, amount_usdc, ts)) = newest else {
        return Ok(None);
    };

    let Some(f) = features::fetch_latest_wallet_features(&db.conn, address)? else {
        return Ok(None);
    };

    let ranked: Option<(u32, f64)> = db
        .conn
        .query_row(
            "SELECT rank, smartscore
             FROM leaderboard
             WHERE wallet = ?1
             ORDER BY rank_date DESC, rank ASC
             LIMIT 1",
            rusqlite::params![address],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (rank, smartscore) = match ranked {
        Some((rank, score)) => (Some(rank), score),
        None => (None, 0.0),
    };

    let trade = SignalTrade {
        wallet: address.to_string(),
        market_name: market_id,
        side: side.unwrap_or_else(|| "BUY".to_string()),
        amount_usdc: amount_usdc.unwrap_or(0.0),
        timestamp: DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::UNIX_EPOCH),
        smartscore,
        entry_timing: f.bait_score,
        rank,
    };
    let snapshot = WalletSnapshot {
        win_rate: f.win_rate,
        avg_roi: f.avg_roi,
        roi_std: f.roi_std,
        total_volume: f.total_volume,
        trades: f.trades,
    };
    Ok(Some((trade, snapshot)))
}

fn show_signal(db: &Database, address: &str) -> Result<()> {
    let Some((trade, snapshot)) = build_signal(db, address)? else {
        println!("No signal for {address}: wallet has no trades or no feature rows yet.");
        return Ok(());
    };
    let m = signal_metrics::compute(&trade, &snapshot);

    println!(
        "Signal: {} {} on {}",
        trade.side, trade.wallet, trade.market_name
    );
    match trade.rank {
        Some(rank) => println!("  rank={rank}  smartscore={:.2}", trade.smartscore),
        None => println!("  (not on the leaderboard)"),
    }
    println!(
        "  amount_usdc={:.2}  at={}",
        trade.amount_usdc,
        trade.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  wallet: win_rate={:.3}  volume_usdc={:.2}  trades={}",
        snapshot.win_rate, snapshot.total_volume, snapshot.trades
    );
    println!(
        "  alpha={:.3}  confidence={:.3}  strength={:.1}",
        m.alpha, m.confidence, m.strength
    );
    println!(
        "  risk={}  target_roi={:.2}%",
        m.risk.as_str(),
        m.target_roi * 100.0
    );
    Ok(())
}

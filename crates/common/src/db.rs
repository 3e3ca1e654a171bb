use anyhow::Result;
use rusqlite::Connection;

pub struct Database {
    pub conn: Connection,
}

/// Async handle to the SQLite store.
///
/// All SQL runs on the dedicated background thread `tokio_rusqlite`
/// owns, so queries never block the Tokio runtime. Clones are cheap and
/// share the channel to that thread.
#[derive(Clone)]
pub struct AsyncDb {
    conn: tokio_rusqlite::Connection,
}

/// The database file is shared with the on-chain collector, which holds
/// write locks while it flushes trade batches. Startup migrations need a
/// write lock of their own, so they retry with backoff instead of
/// crash-looping under systemd when the collector is mid-flush.
fn is_locked(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::DatabaseBusy
                    | rusqlite::ffi::ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}

fn apply_migrations(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)?;
    migrate_trades_raw_pool_depth(conn)?;
    migrate_leaderboard_reasons(conn)?;
    Ok(())
}

impl AsyncDb {
    /// Open `path` and apply PRAGMAs (WAL, foreign keys, busy_timeout)
    /// plus migrations, all on the background thread.
    pub async fn open(path: &str) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path).await?;

        // Short busy_timeout per attempt; the backoff between attempts is
        // handled here in Rust so we can log and bound the total wait.
        let mut backoff = std::time::Duration::from_secs(1);
        let max_backoff = std::time::Duration::from_secs(30);
        let max_total_wait = std::time::Duration::from_secs(10 * 60);
        let start = std::time::Instant::now();

        loop {
            let res = conn
                .call(|conn| -> std::result::Result<(), rusqlite::Error> {
                    conn.busy_timeout(std::time::Duration::from_secs(1))?;
                    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
                    apply_migrations(conn)?;
                    // Normal runtime operations get the long timeout back.
                    conn.busy_timeout(std::time::Duration::from_secs(30))?;
                    Ok(())
                })
                .await;

            match res {
                Ok(()) => break,
                Err(tokio_rusqlite::Error::Error(err)) => {
                    if !is_locked(&err) {
                        return Err(
                            anyhow::Error::from(err).context("opening database: migrations failed")
                        );
                    }

                    if start.elapsed() >= max_total_wait {
                        return Err(anyhow::Error::from(err).context(
                            "opening database: lock did not clear after repeated retries",
                        ));
                    }

                    tracing::warn!(
                        wait_for = ?backoff,
                        "database locked, waiting before retrying migrations"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(other) => return Err(anyhow::anyhow!("opening database: {other}")),
            }
        }

        Ok(Self { conn })
    }

    /// Run `function` against the connection on the SQLite thread.
    ///
    /// The closure gets `&mut rusqlite::Connection` for arbitrary sync
    /// work; its result comes back over a oneshot channel.
    pub async fn call<F, R>(&self, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(move |conn| function(conn)).await.map_err(
            |e: tokio_rusqlite::Error<anyhow::Error>| match e {
                tokio_rusqlite::Error::ConnectionClosed => {
                    anyhow::anyhow!("sqlite background thread closed")
                }
                tokio_rusqlite::Error::Close((_, err)) => {
                    anyhow::anyhow!("closing database: {err}")
                }
                tokio_rusqlite::Error::Error(err) => err,
                other => anyhow::anyhow!("sqlite call failed: {other}"),
            },
        )
    }

    /// [`Self::call`] with Prometheus latency and error accounting.
    ///
    /// The recorded time is wall-clock: queueing on the SQLite thread plus
    /// every statement the closure runs.
    pub async fn call_named<F, R>(&self, op: &'static str, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let start = std::time::Instant::now();
        let res = self.call(function).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        match &res {
            Ok(_) => {
                metrics::histogram!(
                    "ranker_db_query_latency_ms",
                    "op" => op,
                    "status" => "ok"
                )
                .record(ms);
            }
            Err(_) => {
                metrics::histogram!(
                    "ranker_db_query_latency_ms",
                    "op" => op,
                    "status" => "err"
                )
                .record(ms);
                metrics::counter!("ranker_db_query_errors_total", "op" => op).increment(1);
            }
        }

        res
    }
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        // busy_timeout via the rusqlite API: SQLite retries for up to 30s
        // when the database is locked by another connection.
        conn.busy_timeout(std::time::Duration::from_secs(30))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn run_migrations(&self) -> Result<()> {
        apply_migrations(&self.conn).map_err(anyhow::Error::from)
    }
}

/// Add pool_depth to trades_raw if missing (stores created before the
/// collector recorded AMM pool liquidity).
fn migrate_trades_raw_pool_depth(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    let has: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('trades_raw') WHERE name='pool_depth'",
        [],
        |row| row.get(0),
    )?;
    if has == 0 {
        conn.execute("ALTER TABLE trades_raw ADD COLUMN pool_depth REAL", [])?;
    }
    Ok(())
}

/// Add reasons to leaderboard if missing (rows published before score
/// breakdowns were stored alongside the rank).
fn migrate_leaderboard_reasons(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
    let has: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('leaderboard') WHERE name='reasons'",
        [],
        |row| row.get(0),
    )?;
    if has == 0 {
        conn.execute("ALTER TABLE leaderboard ADD COLUMN reasons TEXT", [])?;
    }
    Ok(())
}

const SCHEMA: &str = r#"
-- trades_raw is written by the on-chain collector and only read here.
-- Column changes must stay additive; existing stores migrate in place.
CREATE TABLE IF NOT EXISTS trades_raw (
    id TEXT PRIMARY KEY,               -- txhash_logindex, the collector's dedup key
    market_id TEXT NOT NULL,
    wallet TEXT NOT NULL,
    outcome TEXT,
    side TEXT,                         -- "BUY" or "SELL"
    amount_usdc REAL,
    cost_usdc REAL,
    price_before REAL,
    price_after REAL,
    timestamp INTEGER NOT NULL,        -- unix epoch
    block_number INTEGER,
    pool_depth REAL,                   -- AMM pool liquidity at trade time
    raw_json TEXT,                     -- original event payload
    ingested_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS wallet_daily (
    wallet TEXT NOT NULL,
    day TEXT NOT NULL,                 -- YYYY-MM-DD, UTC
    trades INTEGER NOT NULL DEFAULT 0,
    wins INTEGER NOT NULL DEFAULT 0,
    losses INTEGER NOT NULL DEFAULT 0,
    win_rate REAL NOT NULL DEFAULT 0.0,
    avg_roi REAL NOT NULL DEFAULT 0.0,
    roi_std REAL NOT NULL DEFAULT 0.0,
    total_volume REAL NOT NULL DEFAULT 0.0,
    avg_ticket_size REAL NOT NULL DEFAULT 0.0,
    median_ticket_size REAL NOT NULL DEFAULT 0.0,
    unique_markets INTEGER NOT NULL DEFAULT 0,
    concentration_index REAL NOT NULL DEFAULT 0.0,  -- Herfindahl over per-market volume
    mean_hold_time_secs REAL NOT NULL DEFAULT 0.0,
    max_drawdown REAL NOT NULL DEFAULT 0.0,
    bait_score REAL NOT NULL DEFAULT 0.0,           -- cohort-normalized entry earliness
    insider_flag INTEGER NOT NULL DEFAULT 0,
    is_high_freq INTEGER NOT NULL DEFAULT 0,
    last_trade_at INTEGER,             -- unix epoch of newest trade in window
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (wallet, day)
);

CREATE TABLE IF NOT EXISTS leaderboard (
    rank_date TEXT NOT NULL,           -- YYYY-MM-DD, UTC
    rank INTEGER NOT NULL,
    wallet TEXT NOT NULL,
    smartscore REAL NOT NULL,
    reasons TEXT,                      -- JSON score breakdown, unnormalized inputs
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (rank_date, rank)
);

CREATE TABLE IF NOT EXISTS job_status (
    job_name TEXT PRIMARY KEY,
    status TEXT NOT NULL,              -- running | idle | failed
    last_run_at TEXT,
    duration_ms INTEGER,
    last_error TEXT,
    metadata TEXT,                     -- JSON progress payload
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_trades_raw_wallet ON trades_raw(wallet);
CREATE INDEX IF NOT EXISTS idx_trades_raw_wallet_timestamp ON trades_raw(wallet, timestamp);
CREATE INDEX IF NOT EXISTS idx_trades_raw_timestamp ON trades_raw(timestamp);
CREATE INDEX IF NOT EXISTS idx_trades_raw_market ON trades_raw(market_id);
CREATE INDEX IF NOT EXISTS idx_trades_raw_ingested_at ON trades_raw(ingested_at);
CREATE INDEX IF NOT EXISTS idx_wallet_daily_day ON wallet_daily(day);
CREATE INDEX IF NOT EXISTS idx_leaderboard_wallet ON leaderboard(wallet);
"#;

use anyhow::Result;
use std::sync::Arc;

mod cli;
mod features;
mod flow_metrics;
mod insider;
mod jobs;
mod leaderboard;
mod metrics;
mod scheduler;
mod scoring;
mod signal_metrics;
mod stats;

#[tokio::main]
async fn main() -> Result<()> {
    let config = common::config::Config::load()?;

    let (dispatch, _otel_guard) =
        common::observability::build_dispatch("smartmoney_ranker", &config.general.log_level);
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    tracing::info!("smartmoney_ranker starting");

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // CLI commands run on the sync Database and exit immediately.
    let cmd = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    match cmd {
        cli::Command::Run => {}
        cli::Command::RunOnce => {
            let db = common::db::AsyncDb::open(&config.database.path).await?;
            let summary = jobs::run_scoring_pipeline_once(&db, &config).await?;
            tracing::info!(
                wallets = summary.wallets,
                ranked = summary.ranked,
                "one-shot pipeline done"
            );
            return Ok(());
        }
        other => {
            let db = common::db::Database::open(&config.database.path)?;
            db.run_migrations()?;
            cli::run_command(&db, &config, other)?;
            return Ok(());
        }
    }

    metrics::install_prometheus(config.observability.prometheus_port)?;
    metrics::describe();

    // AsyncDb for the daemon: dedicated background thread for SQLite.
    let db = common::db::AsyncDb::open(&config.database.path).await?;

    let cfg = Arc::new(config);

    let (scoring_tx, mut scoring_rx) = tokio::sync::mpsc::channel::<()>(8);
    let (wal_checkpoint_tx, mut wal_checkpoint_rx) = tokio::sync::mpsc::channel::<()>(8);
    let (flow_metrics_tx, mut flow_metrics_rx) = tokio::sync::mpsc::channel::<()>(8);
    let (sqlite_stats_tx, mut sqlite_stats_rx) = tokio::sync::mpsc::channel::<()>(8);

    let scheduler_jobs = vec![
        scheduler::JobSpec {
            name: "scoring_pipeline".to_string(),
            interval: std::time::Duration::from_secs(cfg.scoring.refresh_interval_secs),
            run_immediately: false, // bootstrap below runs it first
            tick: scoring_tx,
        },
        scheduler::JobSpec {
            name: "wal_checkpoint".to_string(),
            interval: std::time::Duration::from_secs(300),
            run_immediately: false, // nothing to fold at startup
            tick: wal_checkpoint_tx,
        },
        scheduler::JobSpec {
            name: "flow_metrics".to_string(),
            interval: std::time::Duration::from_secs(60), // funnel dashboard cadence
            run_immediately: true,
            tick: flow_metrics_tx,
        },
        scheduler::JobSpec {
            name: "sqlite_stats".to_string(),
            interval: std::time::Duration::from_secs(60), // DB dashboard cadence
            run_immediately: true,
            tick: sqlite_stats_tx,
        },
    ];

    // ── Worker loops first, scheduler second ──
    // Immediate ticks are lost if nobody is listening yet.
    tracing::info!("starting worker loops");

    tokio::spawn({
        let cfg = cfg.clone();
        let db = db.clone();
        async move {
            while scoring_rx.recv().await.is_some() {
                let span = tracing::info_span!("job_run", job = "scoring_pipeline");
                let _g = span.enter();
                match jobs::run_scoring_pipeline_once(&db, cfg.as_ref()).await {
                    Ok(s) => tracing::info!(
                        wallets = s.wallets,
                        skipped = s.skipped,
                        ranked = s.ranked,
                        "scoring_pipeline done"
                    ),
                    Err(e) => tracing::error!(error = %e, "scoring_pipeline failed"),
                }
            }
        }
    });

    tokio::spawn({
        let db = db.clone();
        async move {
            while wal_checkpoint_rx.recv().await.is_some() {
                let span = tracing::info_span!("job_run", job = "wal_checkpoint");
                let _g = span.enter();
                match jobs::run_wal_checkpoint_once(&db).await {
                    Ok((wal_pages, checkpointed)) => {
                        tracing::info!(wal_pages, checkpointed, "wal_checkpoint done");
                    }
                    Err(e) => tracing::error!(error = %e, "wal_checkpoint failed"),
                }
            }
        }
    });

    tokio::spawn({
        let cfg = cfg.clone();
        let db = db.clone();
        async move {
            while flow_metrics_rx.recv().await.is_some() {
                let span = tracing::info_span!("job_run", job = "flow_metrics");
                let _g = span.enter();
                let now = chrono::Utc::now();
                let cutoff = now.timestamp() - i64::from(cfg.aggregation.window_days) * 86_400;
                let day = now.format("%Y-%m-%d").to_string();
                if let Err(e) = jobs::run_flow_metrics_once(&db, cutoff, &day).await {
                    tracing::error!(error = %e, "flow_metrics failed");
                }
            }
        }
    });

    tokio::spawn({
        let db = db.clone();
        let db_path = cfg.database.path.clone();
        async move {
            while sqlite_stats_rx.recv().await.is_some() {
                let span = tracing::info_span!("job_run", job = "sqlite_stats");
                let _g = span.enter();
                if let Err(e) = jobs::run_sqlite_stats_once(&db, &db_path).await {
                    tracing::error!(error = %e, "sqlite_stats failed");
                }
            }
        }
    });

    tracing::info!("worker loops ready");

    // ── Scheduler ──
    let _scheduler_handles = scheduler::start(scheduler_jobs);
    tracing::info!("scheduler started");

    // ── Bootstrap: score whatever the collector has already stored ──
    match jobs::run_scoring_pipeline_once(&db, cfg.as_ref()).await {
        Ok(s) => tracing::info!(
            wallets = s.wallets,
            ranked = s.ranked,
            "bootstrap: scoring_pipeline done"
        ),
        Err(e) => tracing::error!(error = %e, "bootstrap: scoring_pipeline failed"),
    }

    tracing::info!("bootstrap done; worker loops receiving scheduler ticks");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, exiting in 5s");

    // Let in-flight jobs wind down, then exit hard.
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        tracing::warn!("exiting with tasks still running");
        std::process::exit(0);
    });

    Ok(())
}

use anyhow::Result;
use common::db::AsyncDb;
use std::time::Instant;

/// Writes job lifecycle rows to job_status so operators can see what ran,
/// how long it took, and what it last failed with.
pub struct JobTracker {
    db: AsyncDb,
    job_name: String,
    start_time: Instant,
}

impl JobTracker {
    /// Mark the job running and clear leftovers from the previous run.
    pub async fn start(db: &AsyncDb, job_name: &str) -> Result<Self> {
        let name = job_name.to_string();
        db.call_named("job_tracker.start", move |conn| {
            conn.execute(
                "INSERT INTO job_status (job_name, status, last_run_at, updated_at)
                 VALUES (?1, 'running', datetime('now'), datetime('now'))
                 ON CONFLICT(job_name) DO UPDATE SET
                    status = 'running',
                    last_run_at = datetime('now'),
                    updated_at = datetime('now'),
                    last_error = NULL,
                    duration_ms = NULL",
                rusqlite::params![name],
            )?;
            Ok(())
        })
        .await?;

        Ok(Self {
            db: db.clone(),
            job_name: job_name.to_string(),
            start_time: Instant::now(),
        })
    }

    pub async fn success(self, metadata: Option<serde_json::Value>) -> Result<()> {
        let meta_str = metadata.map(|v| v.to_string());
        self.finish("job_tracker.success", "idle", None, meta_str)
            .await
    }

    pub async fn fail(self, error: &anyhow::Error) -> Result<()> {
        self.finish("job_tracker.fail", "failed", Some(error.to_string()), None)
            .await
    }

    /// Write progress metadata while the job is still running.
    pub async fn update_progress(&self, metadata: serde_json::Value) -> Result<()> {
        let name = self.job_name.clone();
        let meta_str = metadata.to_string();

        self.db
            .call_named("job_tracker.update_progress", move |conn| {
                conn.execute(
                    "UPDATE job_status SET
                        metadata = ?2,
                        updated_at = datetime('now')
                     WHERE job_name = ?1",
                    rusqlite::params![name, meta_str],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Shared terminal write. Metadata is COALESCEd so a failing run keeps
    /// its last progress payload visible next to the error.
    async fn finish(
        self,
        op: &'static str,
        status: &'static str,
        error: Option<String>,
        metadata: Option<String>,
    ) -> Result<()> {
        let duration_ms = self.start_time.elapsed().as_millis() as i64;
        let name = self.job_name;

        self.db
            .call_named(op, move |conn| {
                conn.execute(
                    "UPDATE job_status SET
                        status = ?2,
                        duration_ms = ?3,
                        last_error = ?4,
                        metadata = COALESCE(?5, metadata),
                        updated_at = datetime('now')
                     WHERE job_name = ?1",
                    rusqlite::params![name, status, duration_ms, error, metadata],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

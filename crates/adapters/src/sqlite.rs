//! Sqlite-backed job store
//!
//! Durable record of jobs and their ordered output logs, inspectable
//! across process restarts. Mutations go through a single-connection
//! pool, which serializes writes; per-job sequence numbers are assigned
//! inside the insert statement itself.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use krait_core::{EngineError, Job, JobId, JobStatus, OutputLine, OutputSource, Result};
use krait_ports::{EventPublisher, JobEvent, JobStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    target TEXT NOT NULL,
    command TEXT NOT NULL,
    status TEXT NOT NULL,
    exit_code INTEGER,
    created_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT,
    meta TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS outputs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    seq INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    source TEXT NOT NULL,
    line TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outputs_job_seq ON outputs(job_id, seq);
"#;

pub struct SqliteJobStore {
    pool: SqlitePool,
    events: Arc<dyn EventPublisher>,
}

impl SqliteJobStore {
    /// Open (creating if missing) a file-backed store.
    pub async fn connect(
        path: impl AsRef<Path>,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::with_options(options, events).await
    }

    /// Private in-memory store, used by tests and ephemeral runs.
    pub async fn connect_in_memory(events: Arc<dyn EventPublisher>) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(EngineError::storage)?;
        Self::with_options(options, events).await
    }

    async fn with_options(
        options: SqliteConnectOptions,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        // One connection keeps :memory: databases coherent and serializes
        // writes, which is the consistency model the store promises.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(EngineError::storage)?;
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(EngineError::storage)?;
        Ok(Self { pool, events })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Publication must never fail the write it follows.
    async fn emit(&self, event: JobEvent) {
        if let Err(e) = self.events.publish(event).await {
            debug!(error = %e, "dropping job event");
        }
    }

    fn job_from_row(row: &SqliteRow) -> Result<Job> {
        let command: String = row.try_get("command").map_err(EngineError::storage)?;
        let command: Vec<String> =
            serde_json::from_str(&command).map_err(EngineError::storage)?;
        let meta: String = row.try_get("meta").map_err(EngineError::storage)?;
        let meta: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&meta).map_err(EngineError::storage)?;
        let status: String = row.try_get("status").map_err(EngineError::storage)?;

        Ok(Job {
            id: JobId(row.try_get("id").map_err(EngineError::storage)?),
            name: row.try_get("name").map_err(EngineError::storage)?,
            target: row.try_get("target").map_err(EngineError::storage)?,
            command,
            status: status.parse()?,
            exit_code: row.try_get("exit_code").map_err(EngineError::storage)?,
            created_at: row.try_get("created_at").map_err(EngineError::storage)?,
            started_at: row.try_get("started_at").map_err(EngineError::storage)?,
            finished_at: row.try_get("finished_at").map_err(EngineError::storage)?,
            meta,
        })
    }

    fn line_from_row(row: &SqliteRow) -> Result<OutputLine> {
        let source: String = row.try_get("source").map_err(EngineError::storage)?;
        Ok(OutputLine {
            job_id: JobId(row.try_get("job_id").map_err(EngineError::storage)?),
            seq: row.try_get("seq").map_err(EngineError::storage)?,
            timestamp: row.try_get("created_at").map_err(EngineError::storage)?,
            source: source.parse()?,
            text: row.try_get("line").map_err(EngineError::storage)?,
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, name: &str, target: &str, command: Vec<String>) -> Result<Job> {
        let created_at = Utc::now();
        let command_json =
            serde_json::to_string(&command).map_err(EngineError::storage)?;
        let result = sqlx::query(
            "INSERT INTO jobs (name, target, command, status, created_at, meta) \
             VALUES (?1, ?2, ?3, ?4, ?5, '{}')",
        )
        .bind(name)
        .bind(target)
        .bind(&command_json)
        .bind(JobStatus::Queued.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(EngineError::storage)?;

        let job = Job {
            id: JobId(result.last_insert_rowid()),
            name: name.to_string(),
            target: target.to_string(),
            command,
            status: JobStatus::Queued,
            exit_code: None,
            created_at,
            started_at: None,
            finished_at: None,
            meta: serde_json::Map::new(),
        };
        self.emit(JobEvent::Created { job: job.clone() }).await;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(EngineError::storage)?
            .ok_or(EngineError::UnknownJob(id))?;
        Self::job_from_row(&row)
    }

    async fn list(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY id DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(EngineError::storage)?;
        rows.iter().map(Self::job_from_row).collect()
    }

    async fn transition(
        &self,
        id: JobId,
        next: JobStatus,
        exit_code: Option<i64>,
    ) -> Result<Job> {
        let job = self.get(id).await?;
        if !job.status.can_transition_to(next) {
            return Err(EngineError::invalid_transition(job.status, next));
        }

        let now = Utc::now();
        // The status guard in the WHERE clause makes this a compare-and-swap:
        // a concurrent transition loses cleanly instead of double-applying.
        let affected = if next == JobStatus::Running {
            sqlx::query(
                "UPDATE jobs SET status = ?1, started_at = ?2 WHERE id = ?3 AND status = ?4",
            )
            .bind(next.as_str())
            .bind(now)
            .bind(id.0)
            .bind(job.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(EngineError::storage)?
            .rows_affected()
        } else {
            sqlx::query(
                "UPDATE jobs SET status = ?1, finished_at = ?2, exit_code = ?3 \
                 WHERE id = ?4 AND status = ?5",
            )
            .bind(next.as_str())
            .bind(now)
            .bind(exit_code)
            .bind(id.0)
            .bind(job.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(EngineError::storage)?
            .rows_affected()
        };

        if affected == 0 {
            let current = self.get(id).await?;
            return Err(EngineError::invalid_transition(current.status, next));
        }

        self.emit(JobEvent::StatusChanged {
            job_id: id,
            status: next,
            exit_code,
        })
        .await;
        self.get(id).await
    }

    async fn append_output(
        &self,
        id: JobId,
        source: OutputSource,
        text: &str,
    ) -> Result<OutputLine> {
        let job = self.get(id).await?;
        if job.is_terminal() {
            return Err(EngineError::UnknownJob(id));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO outputs (job_id, seq, created_at, source, line) \
             VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM outputs WHERE job_id = ?1), \
                     ?2, ?3, ?4)",
        )
        .bind(id.0)
        .bind(now)
        .bind(source.as_str())
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(EngineError::storage)?;

        let seq: i64 = sqlx::query_scalar("SELECT seq FROM outputs WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
            .map_err(EngineError::storage)?;

        let line = OutputLine {
            job_id: id,
            seq,
            timestamp: now,
            source,
            text: text.to_string(),
        };
        self.emit(JobEvent::Output {
            job_id: id,
            line: line.clone(),
        })
        .await;
        Ok(line)
    }

    async fn set_meta(&self, id: JobId, key: &str, value: serde_json::Value) -> Result<()> {
        let job = self.get(id).await?;
        if !job.is_terminal() {
            return Err(EngineError::MetaBeforeTerminal(id));
        }

        let mut meta = job.meta;
        meta.insert(key.to_string(), value);
        let meta_json = serde_json::to_string(&meta).map_err(EngineError::storage)?;
        sqlx::query("UPDATE jobs SET meta = ?1 WHERE id = ?2")
            .bind(&meta_json)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(EngineError::storage)?;
        Ok(())
    }

    async fn outputs(&self, id: JobId) -> Result<Vec<OutputLine>> {
        // Existence check keeps UnknownJob distinguishable from "no output".
        self.get(id).await?;
        let rows = sqlx::query("SELECT * FROM outputs WHERE job_id = ?1 ORDER BY seq ASC")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(EngineError::storage)?;
        rows.iter().map(Self::line_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use krait_ports::EventSubscriber;

    async fn store() -> SqliteJobStore {
        SqliteJobStore::connect_in_memory(Arc::new(InMemoryBus::default()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_monotonic_ids() {
        let store = store().await;
        let a = store
            .create("discovery", "10.10.0.0/24", vec!["nmap".into()])
            .await
            .unwrap();
        let b = store
            .create("discovery", "10.10.0.0/24", vec!["nmap".into()])
            .await
            .unwrap();
        assert!(b.id > a.id);
        assert_eq!(a.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_transition_enforces_state_machine() {
        let store = store().await;
        let job = store
            .create("echo", "localhost", vec!["echo".into()])
            .await
            .unwrap();

        // queued -> completed is not an edge
        let err = store
            .transition(job.id, JobStatus::Completed, Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        let running = store
            .transition(job.id, JobStatus::Running, None)
            .await
            .unwrap();
        assert!(running.started_at.is_some());

        let done = store
            .transition(job.id, JobStatus::Completed, Some(0))
            .await
            .unwrap();
        assert!(done.finished_at.is_some());
        assert_eq!(done.exit_code, Some(0));

        // terminal states are entered exactly once
        let err = store
            .transition(job.id, JobStatus::Running, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_transition_unknown_job() {
        let store = store().await;
        let err = store
            .transition(JobId(999), JobStatus::Running, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownJob(JobId(999))));
    }

    #[tokio::test]
    async fn test_output_read_back_in_append_order() {
        let store = store().await;
        let job = store
            .create("echo", "localhost", vec!["echo".into()])
            .await
            .unwrap();
        store
            .transition(job.id, JobStatus::Running, None)
            .await
            .unwrap();

        store
            .append_output(job.id, OutputSource::Stdout, "first")
            .await
            .unwrap();
        store
            .append_output(job.id, OutputSource::Stderr, "second")
            .await
            .unwrap();
        store
            .append_output(job.id, OutputSource::Stdout, "third")
            .await
            .unwrap();

        let lines = store.outputs(job.id).await.unwrap();
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        let seqs: Vec<_> = lines.iter().map(|l| l.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(lines[1].source, OutputSource::Stderr);
    }

    #[tokio::test]
    async fn test_append_to_terminal_job_fails() {
        let store = store().await;
        let job = store
            .create("echo", "localhost", vec!["echo".into()])
            .await
            .unwrap();
        store
            .transition(job.id, JobStatus::Running, None)
            .await
            .unwrap();
        store
            .transition(job.id, JobStatus::Completed, Some(0))
            .await
            .unwrap();

        let err = store
            .append_output(job.id, OutputSource::Stdout, "late")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownJob(_)));
    }

    #[tokio::test]
    async fn test_set_meta_requires_terminal_status() {
        let store = store().await;
        let job = store
            .create("echo", "localhost", vec!["echo".into()])
            .await
            .unwrap();

        let err = store
            .set_meta(job.id, "parsers", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MetaBeforeTerminal(_)));

        store
            .transition(job.id, JobStatus::Running, None)
            .await
            .unwrap();
        store
            .transition(job.id, JobStatus::Failed, Some(1))
            .await
            .unwrap();
        store
            .set_meta(job.id, "parsers", serde_json::json!({ "nmap": [] }))
            .await
            .unwrap();

        let job = store.get(job.id).await.unwrap();
        assert!(job.meta.contains_key("parsers"));
    }

    #[tokio::test]
    async fn test_durability_across_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("krait.db");
        let bus: Arc<dyn EventPublisher> = Arc::new(InMemoryBus::default());

        let store = SqliteJobStore::connect(&path, bus.clone()).await.unwrap();
        let job = store
            .create("discovery", "10.10.0.0/24", vec!["nmap".into()])
            .await
            .unwrap();
        store
            .transition(job.id, JobStatus::Running, None)
            .await
            .unwrap();
        store
            .append_output(job.id, OutputSource::Stdout, "Host: 10.10.0.5")
            .await
            .unwrap();
        store.close().await;

        let store = SqliteJobStore::connect(&path, bus).await.unwrap();
        let reloaded = store.get(job.id).await.unwrap();
        assert_eq!(reloaded.name, "discovery");
        assert_eq!(reloaded.status, JobStatus::Running);
        let lines = store.outputs(job.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Host: 10.10.0.5");
    }

    #[tokio::test]
    async fn test_writes_publish_events() {
        let bus = Arc::new(InMemoryBus::new(64));
        let store = SqliteJobStore::connect_in_memory(bus.clone()).await.unwrap();
        let mut rx = bus.subscribe().await;

        let job = store
            .create("echo", "localhost", vec!["echo".into()])
            .await
            .unwrap();
        store
            .transition(job.id, JobStatus::Running, None)
            .await
            .unwrap();
        store
            .append_output(job.id, OutputSource::Stdout, "hello")
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(JobEvent::Created { .. })));
        assert!(matches!(
            rx.recv().await,
            Some(JobEvent::StatusChanged { .. })
        ));
        match rx.recv().await {
            Some(JobEvent::Output { line, .. }) => assert_eq!(line.text, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

//! Job Store Port
//!
//! Durable record of job identity, status, and captured output.

use async_trait::async_trait;
use krait_core::{Job, JobId, JobStatus, OutputLine, OutputSource, Result};

/// Job store port.
///
/// Implementations must serialize mutations per job (no lost updates) and
/// publish a [`crate::JobEvent`] after every successful `transition` and
/// `append_output`. Event delivery is best-effort: a publish failure must
/// never fail the underlying write.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job in `Queued` status and assign its id.
    async fn create(&self, name: &str, target: &str, command: Vec<String>) -> Result<Job>;

    async fn get(&self, id: JobId) -> Result<Job>;

    /// Most recent jobs first.
    async fn list(&self, limit: i64) -> Result<Vec<Job>>;

    /// Apply a status transition, enforcing the legal edge set.
    ///
    /// Fails with `InvalidTransition` for any edge outside the state
    /// machine, and `UnknownJob` for a stale id. Timestamps are stamped
    /// here: `started_at` on entering `Running`, `finished_at` on any
    /// terminal status.
    async fn transition(
        &self,
        id: JobId,
        next: JobStatus,
        exit_code: Option<i64>,
    ) -> Result<Job>;

    /// Append one output line with a freshly assigned per-job sequence
    /// number. Fails with `UnknownJob` if the job is missing or already
    /// terminal.
    async fn append_output(
        &self,
        id: JobId,
        source: OutputSource,
        text: &str,
    ) -> Result<OutputLine>;

    /// Write a meta key. Allowed only once the job is terminal.
    async fn set_meta(&self, id: JobId, key: &str, value: serde_json::Value) -> Result<()>;

    /// Full ordered output log for one job.
    async fn outputs(&self, id: JobId) -> Result<Vec<OutputLine>>;
}

//! Process Runner
//!
//! Executes a job's resolved command as an external process, streaming
//! stdout/stderr line-by-line into the job store as it is produced.
//! Each job's task owns its child process exclusively; a semaphore
//! bounds how many run at once.

use std::process::Stdio;
use std::sync::Arc;

use dashmap::DashMap;
use krait_core::{EngineError, Job, JobId, JobStatus, OutputSource, Result};
use krait_ports::JobStore;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct ProcessRunner {
    store: Arc<dyn JobStore>,
    handles: DashMap<JobId, Arc<Notify>>,
    permits: Arc<Semaphore>,
    done_tx: mpsc::UnboundedSender<JobId>,
}

impl ProcessRunner {
    /// Build a runner and the completion channel its jobs report on.
    ///
    /// Every job that reaches a terminal status is announced exactly once
    /// on the returned receiver; the orchestrator consumes it.
    pub fn new(
        store: Arc<dyn JobStore>,
        max_concurrent: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<JobId>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let runner = Arc::new(Self {
            store,
            handles: DashMap::new(),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            done_tx,
        });
        (runner, done_rx)
    }

    /// Start executing a queued job and return immediately.
    pub fn launch(self: &Arc<Self>, job: Job) {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.run(job).await;
        });
    }

    /// Request termination of a running job. Best-effort: if the process
    /// exits naturally first, the natural terminal status wins.
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        if let Some(handle) = self.handles.get(&id) {
            warn!(job = %id, "cancellation requested");
            handle.notify_one();
            return Ok(());
        }
        // No live handle: the job never existed, already finished, or has
        // not reached its process yet. The last case cannot be honored
        // (there is nothing to kill), so leave a trace of the request.
        let job = self.store.get(id).await?;
        if !job.is_terminal() {
            warn!(job = %id, status = %job.status, "cancellation ignored, no process to kill");
            let _ = self
                .store
                .append_output(
                    id,
                    OutputSource::System,
                    "cancellation ignored: no process to kill",
                )
                .await;
        }
        Ok(())
    }

    pub fn running_count(&self) -> usize {
        self.handles.len()
    }

    async fn run(self: Arc<Self>, job: Job) {
        let id = job.id;
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // semaphore closed, engine shutting down
        };

        if let Err(e) = self.store.transition(id, JobStatus::Running, None).await {
            error!(job = %id, error = %e, "could not mark job running");
            return;
        }

        if let Err(e) = self.execute(&job).await {
            let reason = format!("ERROR: {e}");
            let _ = self
                .store
                .append_output(id, OutputSource::System, &reason)
                .await;
            if let Err(e) = self.store.transition(id, JobStatus::Failed, Some(-1)).await {
                error!(job = %id, error = %e, "could not mark job failed");
            }
        }

        self.handles.remove(&id);
        // Sole trigger for the orchestrator's parse-and-schedule pass.
        let _ = self.done_tx.send(id);
    }

    async fn execute(&self, job: &Job) -> Result<()> {
        let id = job.id;
        let program = job
            .command
            .first()
            .ok_or_else(|| EngineError::LaunchFailure("empty command".to_string()))?;

        let mut child = Command::new(program)
            .args(&job.command[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::LaunchFailure(format!("{program}: {e}")))?;

        info!(job = %id, name = %job.name, target = %job.target, "process spawned");
        let started = format!("started: {}", job.command.join(" "));
        let _ = self
            .store
            .append_output(id, OutputSource::System, &started)
            .await;

        let cancel = Arc::new(Notify::new());
        self.handles.insert(id, cancel.clone());

        let stdout_reader = self.spawn_reader(id, OutputSource::Stdout, child.stdout.take());
        let stderr_reader = self.spawn_reader(id, OutputSource::Stderr, child.stderr.take());

        let mut cancelled = false;
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.notified() => None,
        };
        let status = match waited {
            Some(status) => status,
            None => match child.try_wait() {
                // Exited naturally just before the kill; natural status wins.
                Ok(Some(exit)) => Ok(exit),
                _ => {
                    let _ = child.start_kill();
                    cancelled = true;
                    child.wait().await
                }
            },
        };

        // Drain captured output before the job turns terminal; appends to
        // a terminal job are rejected by the store.
        if let Some(reader) = stdout_reader {
            let _ = reader.await;
        }
        if let Some(reader) = stderr_reader {
            let _ = reader.await;
        }

        let exit = status.map_err(|e| EngineError::LaunchFailure(format!("wait: {e}")))?;
        let code = exit.code().map(i64::from);

        if cancelled {
            let _ = self
                .store
                .append_output(id, OutputSource::System, "cancelled: process terminated")
                .await;
            self.store
                .transition(id, JobStatus::Cancelled, code)
                .await?;
        } else {
            let summary = match code {
                Some(c) => format!("exit code {c}"),
                None => "terminated by signal".to_string(),
            };
            let _ = self
                .store
                .append_output(id, OutputSource::System, &summary)
                .await;
            let next = if exit.success() {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            };
            self.store.transition(id, next, code).await?;
        }
        Ok(())
    }

    fn spawn_reader<R>(
        &self,
        id: JobId,
        source: OutputSource,
        reader: Option<R>,
    ) -> Option<JoinHandle<()>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let reader = reader?;
        let store = Arc::clone(&self.store);
        Some(tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(text)) => {
                        if let Err(e) = store.append_output(id, source, &text).await {
                            warn!(job = %id, error = %e, "dropping output line");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(job = %id, error = %e, "output stream closed");
                        break;
                    }
                }
            }
        }))
    }
}

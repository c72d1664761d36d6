//! Orchestrator
//!
//! Consumes the runner's completion channel and turns each terminal job
//! into state updates and new work: parse output, persist credentials
//! and host observations, derive follow-ups, and schedule the ones the
//! policy and the auto-exploit gate allow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use krait_core::{
    Credential, FollowUp, FollowUpClass, Job, JobId, JobStatus, Result, SecretKind,
};
use krait_ports::{EventPublisher, JobEvent, JobStore, SessionStore, UpsertOutcome};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::catalog;
use crate::inventory::HostInventory;
use crate::policy::FollowUpPolicy;
use crate::registry::ParserRegistry;
use crate::runner::ProcessRunner;

pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    runner: Arc<ProcessRunner>,
    sessions: Arc<dyn SessionStore>,
    events: Arc<dyn EventPublisher>,
    inventory: Arc<HostInventory>,
    registry: ParserRegistry,
    policy: FollowUpPolicy,
    /// `(job type, target)` pairs already auto-scheduled this run.
    ledger: DashSet<(String, String)>,
    auto_exploit: AtomicBool,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn JobStore>,
        runner: Arc<ProcessRunner>,
        sessions: Arc<dyn SessionStore>,
        events: Arc<dyn EventPublisher>,
        inventory: Arc<HostInventory>,
        registry: ParserRegistry,
        auto_exploit: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            runner,
            sessions,
            events,
            inventory,
            registry,
            policy: FollowUpPolicy::new(),
            ledger: DashSet::new(),
            auto_exploit: AtomicBool::new(auto_exploit),
        })
    }

    pub fn auto_exploit(&self) -> bool {
        self.auto_exploit.load(Ordering::Relaxed)
    }

    pub fn set_auto_exploit(&self, enabled: bool) {
        let was = self.auto_exploit.swap(enabled, Ordering::Relaxed);
        if was != enabled {
            warn!(enabled, "auto-exploit gate changed");
        }
    }

    /// Resolve and launch a job by type. Direct submissions bypass the
    /// scheduling ledger, so an operator can rerun anything at will.
    pub async fn submit(&self, name: &str, target: &str) -> Result<Job> {
        let credential = match catalog::class_of(name) {
            FollowUpClass::Exploitation => self.credential_for(target).await,
            FollowUpClass::Enumeration => None,
        };
        let command = catalog::resolve(name, target, credential.as_ref())?;
        let job = self.store.create(name, target, command).await?;
        info!(job = %job.id, name, target, "job submitted");
        self.runner.launch(job.clone());
        Ok(job)
    }

    pub async fn cancel(&self, id: JobId) -> Result<()> {
        self.runner.cancel(id).await
    }

    /// Drive the feedback loop until the completion channel closes.
    pub async fn run(self: Arc<Self>, mut done_rx: mpsc::UnboundedReceiver<JobId>) {
        while let Some(id) = done_rx.recv().await {
            let orchestrator = Arc::clone(&self);
            tokio::spawn(async move {
                orchestrator.process_terminal(id).await;
            });
        }
        info!("completion channel closed, orchestrator stopping");
    }

    /// One parse-and-schedule pass, retried once. A second failure is
    /// recorded on the job and abandoned.
    pub async fn process_terminal(&self, id: JobId) {
        let Err(first) = self.pass(id).await else {
            return;
        };
        warn!(job = %id, error = %first, "pass failed, retrying once");
        let Err(second) = self.pass(id).await else {
            return;
        };
        error!(job = %id, error = %second, "pass failed twice, abandoning");
        if let Err(e) = self
            .store
            .set_meta(id, "parse_failure", json!(second.to_string()))
            .await
        {
            error!(job = %id, error = %e, "could not record parse failure");
        }
    }

    async fn pass(&self, id: JobId) -> Result<()> {
        let job = self.store.get(id).await?;
        // Failed jobs are parsed too: tools like crackmapexec exit
        // non-zero after printing perfectly good credentials. Cancelled
        // jobs are not, their truncated output is kept but untrusted.
        if !matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return Ok(());
        }

        let lines = self.store.outputs(id).await?;
        let outcome = self.registry.parse_all(&job, &lines);
        if outcome.matched.is_empty() {
            return Ok(());
        }

        if outcome.finding.is_empty() {
            self.store.set_meta(id, "parse_empty", json!(true)).await?;
            return Ok(());
        }
        self.store
            .set_meta(
                id,
                "parsers",
                json!({
                    "matched": outcome.matched,
                    "finding": outcome.finding.meta_summary(),
                }),
            )
            .await?;

        for credential in outcome.finding.credentials.iter().cloned() {
            let key = credential.key();
            match self.sessions.upsert(credential).await? {
                UpsertOutcome::Inserted => {
                    info!(job = %id, principal = %key.0, "credential captured")
                }
                UpsertOutcome::Duplicate => {}
            }
        }
        for host in outcome.finding.hosts.values() {
            self.inventory.upsert(host.clone());
        }

        let follow_ups = self.policy.derive(&outcome.finding)?;
        for follow_up in follow_ups {
            self.dispatch(&job, follow_up).await?;
        }
        Ok(())
    }

    async fn dispatch(&self, parent: &Job, follow_up: FollowUp) -> Result<()> {
        if follow_up.class == FollowUpClass::Exploitation {
            if !self.auto_exploit() {
                return self
                    .record_skip(parent, &follow_up, "auto-exploit disabled")
                    .await;
            }
            if self.credential_for(&follow_up.target).await.is_none() {
                return self
                    .record_skip(parent, &follow_up, "no applicable credential")
                    .await;
            }
        }

        let key = follow_up.key();
        // Atomic claim; a concurrent pass deriving the same follow-up
        // loses the insert and schedules nothing.
        if !self.ledger.insert(key.clone()) {
            return Ok(());
        }
        match self.spawn_follow_up(parent, &follow_up).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Release the claim so a retried pass can schedule it.
                self.ledger.remove(&key);
                Err(e)
            }
        }
    }

    async fn spawn_follow_up(&self, parent: &Job, follow_up: &FollowUp) -> Result<()> {
        let job = self
            .store
            .create(&follow_up.name, &follow_up.target, follow_up.command.clone())
            .await?;
        info!(
            job = %job.id,
            parent = %parent.id,
            name = %follow_up.name,
            target = %follow_up.target,
            class = ?follow_up.class,
            "follow-up scheduled"
        );
        self.runner.launch(job);
        Ok(())
    }

    /// Record a withheld exploitation follow-up on the parent job and
    /// announce it on the bus.
    async fn record_skip(&self, parent: &Job, follow_up: &FollowUp, reason: &str) -> Result<()> {
        warn!(
            parent = %parent.id,
            name = %follow_up.name,
            target = %follow_up.target,
            reason,
            "follow-up withheld"
        );
        if let Err(e) = self
            .events
            .publish(JobEvent::FollowUpSkipped {
                job_id: parent.id,
                job_type: follow_up.name.clone(),
                target: follow_up.target.clone(),
                reason: reason.to_string(),
            })
            .await
        {
            warn!(error = %e, "skip event dropped");
        }

        let current = self.store.get(parent.id).await?;
        let mut skipped = match current.meta.get("skipped_follow_ups") {
            Some(Value::Array(entries)) => entries.clone(),
            _ => Vec::new(),
        };
        let entry = json!({
            "job_type": follow_up.name,
            "target": follow_up.target,
            "reason": reason,
        });
        if !skipped.contains(&entry) {
            skipped.push(entry);
        }
        self.store
            .set_meta(parent.id, "skipped_follow_ups", Value::Array(skipped))
            .await
    }

    /// Best credential on file for a target: cleartext passwords are
    /// preferred over NTLM hashes.
    async fn credential_for(&self, target: &str) -> Option<Credential> {
        let mut usable: Vec<Credential> = self
            .sessions
            .find_for_target(target)
            .await
            .into_iter()
            .filter(catalog::usable_for_exploit)
            .collect();
        usable.sort_by_key(|c| c.kind != SecretKind::Password);
        usable.into_iter().next()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("ledger_entries", &self.ledger.len())
            .field("auto_exploit", &self.auto_exploit())
            .finish()
    }
}

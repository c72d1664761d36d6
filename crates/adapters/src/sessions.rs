//! In-memory session store
//!
//! Credentials keyed by `(principal, secret-kind)`; the dashmap entry API
//! makes each upsert atomic for its own key while unrelated keys proceed
//! in parallel.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use krait_core::{Credential, Result, SecretKind};
use krait_ports::{SessionStore, UpsertOutcome};
use tracing::info;

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: DashMap<(String, SecretKind), Credential>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn upsert(&self, credential: Credential) -> Result<UpsertOutcome> {
        match self.entries.entry(credential.key()) {
            Entry::Occupied(_) => Ok(UpsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                info!(
                    principal = %credential.principal,
                    kind = %credential.kind,
                    source_job = %credential.source_job,
                    "new credential discovered"
                );
                slot.insert(credential);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn find_for_target(&self, target: &str) -> Vec<Credential> {
        self.entries
            .iter()
            .filter(|entry| entry.value().applies_to(target))
            .map(|entry| entry.value().clone())
            .collect()
    }

    async fn list(&self) -> Vec<Credential> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.discovered_at.cmp(&b.discovered_at));
        all
    }
}

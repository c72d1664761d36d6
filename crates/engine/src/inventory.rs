//! Shared host inventory
//!
//! Hosts and their observed services, merged across jobs for the run's
//! lifetime. The orchestrator writes; external collaborators read
//! snapshots.

use dashmap::DashMap;
use krait_core::HostObservation;

#[derive(Default)]
pub struct HostInventory {
    hosts: DashMap<String, HostObservation>,
}

impl HostInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one observation into the inventory (port/service union).
    pub fn upsert(&self, observation: HostObservation) {
        self.hosts
            .entry(observation.addr.clone())
            .and_modify(|existing| existing.absorb(&observation))
            .or_insert(observation);
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Point-in-time copy, ordered by address for stable listings.
    pub fn snapshot(&self) -> Vec<HostObservation> {
        let mut all: Vec<_> = self
            .hosts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.addr.cmp(&b.addr));
        all
    }
}

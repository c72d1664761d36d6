//! Structured parser results

use crate::credential::Credential;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// A host seen in tool output, with whatever ports and services the
/// tool reported open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostObservation {
    pub addr: String,
    pub open_ports: BTreeSet<u16>,
    pub services: BTreeSet<String>,
}

impl HostObservation {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            open_ports: BTreeSet::new(),
            services: BTreeSet::new(),
        }
    }

    /// Fold another observation of the same host into this one.
    pub fn absorb(&mut self, other: &HostObservation) {
        self.open_ports.extend(other.open_ports.iter().copied());
        self.services.extend(other.services.iter().cloned());
    }
}

/// Policy classification of a follow-up request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpClass {
    /// Auto-submitted, subject only to scheduling-ledger dedup.
    Enumeration,
    /// Gated on the auto-exploit flag and an applicable credential.
    Exploitation,
}

/// A new job request derived from a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    pub name: String,
    pub target: String,
    pub command: Vec<String>,
    pub class: FollowUpClass,
}

impl FollowUp {
    /// Scheduling-ledger key.
    pub fn key(&self) -> (String, String) {
        (self.name.clone(), self.target.clone())
    }
}

/// Everything the parsers extracted from one job's completed output.
///
/// Findings are ephemeral: they live for one orchestrator pass and are
/// folded into job meta, the session store, and scheduling decisions.
#[derive(Debug, Clone, Default)]
pub struct Finding {
    pub hosts: BTreeMap<String, HostObservation>,
    pub credentials: Vec<Credential>,
    pub follow_ups: Vec<FollowUp>,
    /// Free-form attributes (e.g. domain name, user lists) keyed by name.
    pub attributes: serde_json::Map<String, Value>,
}

impl Finding {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
            && self.credentials.is_empty()
            && self.follow_ups.is_empty()
            && self.attributes.is_empty()
    }

    pub fn add_host(&mut self, host: HostObservation) {
        self.hosts
            .entry(host.addr.clone())
            .and_modify(|existing| existing.absorb(&host))
            .or_insert(host);
    }

    pub fn add_credential(&mut self, credential: Credential) {
        let key = credential.key();
        if !self.credentials.iter().any(|c| c.key() == key) {
            self.credentials.push(credential);
        }
    }

    pub fn add_follow_up(&mut self, follow_up: FollowUp) {
        let key = follow_up.key();
        if !self.follow_ups.iter().any(|f| f.key() == key) {
            self.follow_ups.push(follow_up);
        }
    }

    /// Union-merge another finding into this one.
    ///
    /// Values already present are kept; later parsers only add, they
    /// never overwrite earlier extractions.
    pub fn merge(&mut self, other: Finding) {
        for (_, host) in other.hosts {
            self.add_host(host);
        }
        for credential in other.credentials {
            self.add_credential(credential);
        }
        for follow_up in other.follow_ups {
            self.add_follow_up(follow_up);
        }
        for (key, value) in other.attributes {
            self.attributes.entry(key).or_insert(value);
        }
    }

    /// Secret-free summary suitable for persisting into job meta.
    pub fn meta_summary(&self) -> Value {
        json!({
            "hosts": self.hosts.values().collect::<Vec<_>>(),
            "credentials": self
                .credentials
                .iter()
                .map(|c| json!({ "principal": c.principal, "kind": c.kind }))
                .collect::<Vec<_>>(),
            "follow_ups": self
                .follow_ups
                .iter()
                .map(|f| json!({ "name": f.name, "target": f.target, "class": f.class }))
                .collect::<Vec<_>>(),
            "attributes": Value::Object(self.attributes.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::SecretKind;
    use crate::job::JobId;
    use chrono::Utc;

    fn host(addr: &str, ports: &[u16]) -> HostObservation {
        let mut h = HostObservation::new(addr);
        h.open_ports.extend(ports.iter().copied());
        h
    }

    fn cred(principal: &str) -> Credential {
        Credential {
            principal: principal.to_string(),
            kind: SecretKind::Password,
            secret: "s3cret".to_string(),
            host: None,
            source_job: JobId(1),
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_unions_host_ports() {
        let mut a = Finding::default();
        a.add_host(host("10.0.0.1", &[445]));

        let mut b = Finding::default();
        b.add_host(host("10.0.0.1", &[88, 389]));
        b.add_host(host("10.0.0.2", &[445]));

        a.merge(b);
        assert_eq!(a.hosts.len(), 2);
        let merged = &a.hosts["10.0.0.1"];
        assert_eq!(merged.open_ports.len(), 3);
    }

    #[test]
    fn test_merge_never_duplicates_credentials() {
        let mut a = Finding::default();
        a.add_credential(cred("CORP\\alice"));

        let mut b = Finding::default();
        b.add_credential(cred("CORP\\alice"));
        b.add_credential(cred("CORP\\bob"));

        a.merge(b);
        assert_eq!(a.credentials.len(), 2);
    }

    #[test]
    fn test_earlier_attributes_win() {
        let mut a = Finding::default();
        a.attributes.insert("domain".into(), json!("CORP"));

        let mut b = Finding::default();
        b.attributes.insert("domain".into(), json!("OTHER"));
        b.attributes.insert("users".into(), json!(["alice"]));

        a.merge(b);
        assert_eq!(a.attributes["domain"], json!("CORP"));
        assert_eq!(a.attributes["users"], json!(["alice"]));
    }

    #[test]
    fn test_meta_summary_has_no_secrets() {
        let mut f = Finding::default();
        f.add_credential(cred("CORP\\alice"));
        let rendered = f.meta_summary().to_string();
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("CORP\\\\alice"));
    }
}

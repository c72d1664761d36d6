//! Discovered credentials and identities

use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of secret material backing a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretKind {
    Password,
    NtlmHash,
    AsRepHash,
    Ticket,
}

impl SecretKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::NtlmHash => "ntlm-hash",
            Self::AsRepHash => "asrep-hash",
            Self::Ticket => "ticket",
        }
    }
}

impl std::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered credential or identity.
///
/// Identity is the `(principal, kind)` pair; re-discovering the same pair
/// is a no-op in the session store. The secret itself is never serialized
/// or printed outside the record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Domain-qualified user or equivalent, e.g. `CORP\alice`.
    pub principal: String,
    pub kind: SecretKind,
    #[serde(skip_serializing, default)]
    pub secret: String,
    /// Host the credential was observed or validated against, if known.
    pub host: Option<String>,
    pub source_job: JobId,
    pub discovered_at: DateTime<Utc>,
}

impl Credential {
    pub fn key(&self) -> (String, SecretKind) {
        (self.principal.clone(), self.kind)
    }

    /// Domain component of the principal, if it carries one.
    ///
    /// Understands both `DOMAIN\user` and `user@domain` spellings.
    pub fn domain(&self) -> Option<&str> {
        if let Some((dom, _)) = self.principal.split_once('\\') {
            if !dom.is_empty() {
                return Some(dom);
            }
        }
        if let Some((_, dom)) = self.principal.split_once('@') {
            if !dom.is_empty() {
                return Some(dom);
            }
        }
        None
    }

    /// Heuristic association between this credential and a target.
    ///
    /// A credential applies when it was observed on the same host, or when
    /// the target string mentions the credential's domain. This is a policy
    /// decision, not a guarantee the credential is valid there.
    pub fn applies_to(&self, target: &str) -> bool {
        if let Some(host) = &self.host {
            if host.eq_ignore_ascii_case(target) {
                return true;
            }
        }
        if let Some(dom) = self.domain() {
            if target.to_ascii_lowercase().contains(&dom.to_ascii_lowercase()) {
                return true;
            }
        }
        false
    }
}

// Secrets stay out of logs; Debug prints a redacted placeholder.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("principal", &self.principal)
            .field("kind", &self.kind)
            .field("secret", &"<redacted>")
            .field("host", &self.host)
            .field("source_job", &self.source_job)
            .field("discovered_at", &self.discovered_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(principal: &str, host: Option<&str>) -> Credential {
        Credential {
            principal: principal.to_string(),
            kind: SecretKind::Password,
            secret: "hunter2".to_string(),
            host: host.map(str::to_string),
            source_job: JobId(1),
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_domain_extraction() {
        assert_eq!(cred("CORP\\alice", None).domain(), Some("CORP"));
        assert_eq!(cred("alice@corp.local", None).domain(), Some("corp.local"));
        assert_eq!(cred("alice", None).domain(), None);
    }

    #[test]
    fn test_applies_to_same_host() {
        let c = cred("alice", Some("10.10.10.5"));
        assert!(c.applies_to("10.10.10.5"));
        assert!(!c.applies_to("10.10.10.6"));
    }

    #[test]
    fn test_applies_to_domain_scope() {
        let c = cred("alice@corp.local", None);
        assert!(c.applies_to("dc01.corp.local"));
        assert!(!c.applies_to("10.10.10.5"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let c = cred("alice", None);
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serialize_omits_secret() {
        let c = cred("alice", None);
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("hunter2"));
    }
}

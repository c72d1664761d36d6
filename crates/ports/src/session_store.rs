//! Session Store Port
//!
//! Deduplicated store of discovered credentials and identities.

use async_trait::async_trait;
use krait_core::{Credential, Result};
use serde::Serialize;

/// Result of a credential upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    /// The `(principal, secret-kind)` pair was already known; no-op.
    Duplicate,
}

/// Session store port. Upserts must be atomic per key; different keys may
/// be written concurrently.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn upsert(&self, credential: Credential) -> Result<UpsertOutcome>;

    /// Credentials heuristically applicable to a target, per
    /// [`Credential::applies_to`]. Used by the exploitation gate.
    async fn find_for_target(&self, target: &str) -> Vec<Credential>;

    async fn list(&self) -> Vec<Credential>;
}

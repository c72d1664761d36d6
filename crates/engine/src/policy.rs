//! Follow-up derivation policy
//!
//! Turns one job's finding into follow-up job requests. Hosts exposing
//! AD service ports get the standard enumeration battery; passwords and
//! NTLM hashes bound to a host get a psexec exploitation request.
//! The policy only proposes; the orchestrator applies the scheduling
//! ledger and the auto-exploit gate.

use krait_core::{Finding, FollowUp, FollowUpClass, Result};

use crate::catalog::{self, AD_PORTS, ENUM_FOLLOW_UPS};

#[derive(Default)]
pub struct FollowUpPolicy;

impl FollowUpPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn derive(&self, finding: &Finding) -> Result<Vec<FollowUp>> {
        let mut follow_ups = Vec::new();

        for host in finding.hosts.values() {
            let interesting = AD_PORTS.iter().any(|p| host.open_ports.contains(p));
            if !interesting {
                continue;
            }
            for name in ENUM_FOLLOW_UPS {
                follow_ups.push(FollowUp {
                    name: name.to_string(),
                    target: host.addr.clone(),
                    command: catalog::resolve(name, &host.addr, None)?,
                    class: FollowUpClass::Enumeration,
                });
            }
        }

        for credential in &finding.credentials {
            if !catalog::usable_for_exploit(credential) {
                continue;
            }
            let Some(host) = credential.host.as_deref() else {
                continue;
            };
            follow_ups.push(FollowUp {
                name: "psexec".to_string(),
                target: host.to_string(),
                command: catalog::resolve("psexec", host, Some(credential))?,
                class: FollowUpClass::Exploitation,
            });
        }

        Ok(follow_ups)
    }
}

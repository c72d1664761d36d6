//! crackmapexec `--json` output parser.
//!
//! cme emits one JSON object per line. Lines whose `authentication.success`
//! flag is true yield a password credential bound to the reported host;
//! everything else (banners, share listings, non-JSON noise) is skipped.

use chrono::Utc;
use krait_core::{Credential, Finding, Job, OutputLine, Result, SecretKind};
use krait_ports::OutputParser;
use serde_json::Value;

use super::stdout_lines;

#[derive(Default)]
pub struct CmeJsonParser;

impl CmeJsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl OutputParser for CmeJsonParser {
    fn name(&self) -> &'static str {
        "cme-json"
    }

    fn matches(&self, job: &Job) -> bool {
        job.name == "cme"
    }

    fn parse(&self, job: &Job, lines: &[OutputLine]) -> Result<Finding> {
        let mut finding = Finding::default();

        for line in stdout_lines(lines) {
            let Ok(Value::Object(record)) = serde_json::from_str(&line.text) else {
                continue;
            };
            let authenticated = record
                .get("authentication")
                .and_then(|a| a.get("success"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !authenticated {
                continue;
            }
            let Some(username) = record.get("username").and_then(Value::as_str) else {
                continue;
            };
            let Some(password) = record.get("password").and_then(Value::as_str) else {
                continue;
            };

            let principal = match record.get("domain").and_then(Value::as_str) {
                Some(domain) if !domain.is_empty() => format!("{domain}\\{username}"),
                _ => username.to_string(),
            };
            let host = record
                .get("target")
                .and_then(Value::as_str)
                .unwrap_or(&job.target)
                .to_string();

            finding.add_credential(Credential {
                principal,
                kind: SecretKind::Password,
                secret: password.to_string(),
                host: Some(host),
                source_job: job.id,
                discovered_at: Utc::now(),
            });
        }

        Ok(finding)
    }
}

//! enum4linux-ng output parser.
//!
//! Pulls the domain name, user list, and share list out of the textual
//! report and records them as finding attributes.

use krait_core::{Finding, Job, OutputLine, Result};
use krait_ports::OutputParser;
use regex::Regex;
use serde_json::json;

use super::stdout_lines;

pub struct Enum4LinuxParser {
    domain: Regex,
    user: Regex,
    share: Regex,
}

impl Enum4LinuxParser {
    pub fn new() -> Self {
        Self {
            domain: Regex::new(r"(?i)^\s*Domain(?:\s+Name)?:\s+(\S+)").expect("static regex"),
            user: Regex::new(r"(?i)^\s*User(?:name)?:\s+(\S+)").expect("static regex"),
            share: Regex::new(r"(?i)^\s*Share:\s+(\S+)").expect("static regex"),
        }
    }
}

impl Default for Enum4LinuxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser for Enum4LinuxParser {
    fn name(&self) -> &'static str {
        "enum4linux"
    }

    fn matches(&self, job: &Job) -> bool {
        job.name == "enum4linux"
    }

    fn parse(&self, _job: &Job, lines: &[OutputLine]) -> Result<Finding> {
        let mut finding = Finding::default();
        let mut users: Vec<String> = Vec::new();
        let mut shares: Vec<String> = Vec::new();

        for line in stdout_lines(lines) {
            if let Some(caps) = self.domain.captures(&line.text) {
                finding
                    .attributes
                    .entry("domain".to_string())
                    .or_insert_with(|| json!(&caps[1]));
            } else if let Some(caps) = self.user.captures(&line.text) {
                let name = caps[1].to_string();
                if !users.contains(&name) {
                    users.push(name);
                }
            } else if let Some(caps) = self.share.captures(&line.text) {
                let name = caps[1].to_string();
                if !shares.contains(&name) {
                    shares.push(name);
                }
            }
        }

        if !users.is_empty() {
            finding.attributes.insert("users".to_string(), json!(users));
        }
        if !shares.is_empty() {
            finding
                .attributes
                .insert("shares".to_string(), json!(shares));
        }

        Ok(finding)
    }
}

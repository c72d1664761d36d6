//! Parsers for impacket tool output: GetNPUsers AS-REP hashes and
//! secretsdump NTLM hash dumps.

use chrono::Utc;
use krait_core::{Credential, Finding, Job, OutputLine, Result, SecretKind};
use krait_ports::OutputParser;
use regex::Regex;

use super::stdout_lines;

/// Extracts `$krb5asrep$...` hashes printed by GetNPUsers for accounts
/// without Kerberos pre-authentication.
pub struct AsRepParser {
    hash: Regex,
}

impl AsRepParser {
    pub fn new() -> Self {
        Self {
            // $krb5asrep$23$alice@CORP.LOCAL:3f5d...$...
            hash: Regex::new(r"(\$krb5asrep\$\d+\$([^@\s:]+)@([^\s:]+):\S+)")
                .expect("static regex"),
        }
    }
}

impl Default for AsRepParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser for AsRepParser {
    fn name(&self) -> &'static str {
        "asrep"
    }

    fn matches(&self, job: &Job) -> bool {
        job.name == "getnpusers"
    }

    fn parse(&self, job: &Job, lines: &[OutputLine]) -> Result<Finding> {
        let mut finding = Finding::default();

        for line in stdout_lines(lines) {
            let Some(caps) = self.hash.captures(&line.text) else {
                continue;
            };
            let principal = format!("{}\\{}", &caps[3], &caps[2]);
            finding.add_credential(Credential {
                principal,
                kind: SecretKind::AsRepHash,
                secret: caps[1].to_string(),
                host: None,
                source_job: job.id,
                discovered_at: Utc::now(),
            });
        }

        Ok(finding)
    }
}

/// Extracts NTLM hashes from secretsdump's `user:rid:lm:nt:::` lines.
pub struct SecretsDumpParser {
    entry: Regex,
}

impl SecretsDumpParser {
    pub fn new() -> Self {
        Self {
            entry: Regex::new(
                r"^([^:\s]+):(\d+):([0-9a-fA-F]{32}):([0-9a-fA-F]{32}):::",
            )
            .expect("static regex"),
        }
    }
}

impl Default for SecretsDumpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser for SecretsDumpParser {
    fn name(&self) -> &'static str {
        "secretsdump"
    }

    fn matches(&self, job: &Job) -> bool {
        job.name == "secretsdump"
    }

    fn parse(&self, job: &Job, lines: &[OutputLine]) -> Result<Finding> {
        let mut finding = Finding::default();

        for line in stdout_lines(lines) {
            let Some(caps) = self.entry.captures(&line.text) else {
                continue;
            };
            finding.add_credential(Credential {
                principal: caps[1].to_string(),
                kind: SecretKind::NtlmHash,
                secret: caps[4].to_ascii_lowercase(),
                host: Some(job.target.clone()),
                source_job: job.id,
                discovered_at: Utc::now(),
            });
        }

        Ok(finding)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{job, stdout};
    use super::*;

    #[test]
    fn test_asrep_hash_extraction() {
        let parser = AsRepParser::new();
        let lines = stdout(&[
            "[*] Getting TGT for alice",
            "$krb5asrep$23$alice@CORP.LOCAL:3f5de5b1a0$9c2f11aabbcc",
            "[-] User bob doesn't have UF_DONT_REQUIRE_PREAUTH set",
        ]);

        let finding = parser
            .parse(&job("getnpusers", "corp.local"), &lines)
            .unwrap();
        assert_eq!(finding.credentials.len(), 1);
        let cred = &finding.credentials[0];
        assert_eq!(cred.principal, "CORP.LOCAL\\alice");
        assert_eq!(cred.kind, SecretKind::AsRepHash);
        assert!(cred.secret.starts_with("$krb5asrep$23$"));
    }

    #[test]
    fn test_asrep_ignores_unrelated_output() {
        let parser = AsRepParser::new();
        let lines = stdout(&["Impacket v0.11.0", "[-] Kerberos SessionError"]);
        let finding = parser
            .parse(&job("getnpusers", "corp.local"), &lines)
            .unwrap();
        assert!(finding.is_empty());
    }

    #[test]
    fn test_secretsdump_ntlm_extraction() {
        let parser = SecretsDumpParser::new();
        let lines = stdout(&[
            "[*] Dumping local SAM hashes (uid:rid:lmhash:nthash)",
            "Administrator:500:aad3b435b51404eeaad3b435b51404ee:31d6cfe0d16ae931b73c59d7e0c089c0:::",
            "Guest:501:aad3b435b51404eeaad3b435b51404ee:not-a-hash:::",
        ]);

        let finding = parser
            .parse(&job("secretsdump", "10.10.10.5"), &lines)
            .unwrap();
        assert_eq!(finding.credentials.len(), 1);
        let cred = &finding.credentials[0];
        assert_eq!(cred.principal, "Administrator");
        assert_eq!(cred.kind, SecretKind::NtlmHash);
        assert_eq!(cred.secret, "31d6cfe0d16ae931b73c59d7e0c089c0");
        assert_eq!(cred.host.as_deref(), Some("10.10.10.5"));
    }

    #[test]
    fn test_parsers_match_their_job_types() {
        assert!(AsRepParser::new().matches(&job("getnpusers", "t")));
        assert!(!AsRepParser::new().matches(&job("secretsdump", "t")));
        assert!(SecretsDumpParser::new().matches(&job("secretsdump", "t")));
    }
}

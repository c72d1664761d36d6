//! nmap greppable (`-oG -`) output parser.
//!
//! Recognizes `Host: <addr> (...)  Ports: 445/open/tcp//microsoft-ds///, ...`
//! lines and extracts one observation per host with its open ports and
//! service names. Filtered, closed, and unresolvable entries are ignored.

use krait_core::{Finding, HostObservation, Job, OutputLine, Result};
use krait_ports::OutputParser;
use regex::Regex;

use super::stdout_lines;

pub struct NmapGrepParser {
    host_line: Regex,
}

impl NmapGrepParser {
    pub fn new() -> Self {
        Self {
            // greppable host line: "Host: 10.0.0.1 (name)  Ports: ..."
            host_line: Regex::new(r"^Host:\s+(\S+)\s+\(.*?\)\s+Ports:\s+(.+)$")
                .expect("static regex"),
        }
    }
}

impl Default for NmapGrepParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser for NmapGrepParser {
    fn name(&self) -> &'static str {
        "nmap-grep"
    }

    fn matches(&self, job: &Job) -> bool {
        matches!(job.name.as_str(), "discovery" | "smb-scripts")
    }

    fn parse(&self, _job: &Job, lines: &[OutputLine]) -> Result<Finding> {
        let mut finding = Finding::default();

        for line in stdout_lines(lines) {
            let Some(caps) = self.host_line.captures(&line.text) else {
                continue;
            };
            let mut host = HostObservation::new(&caps[1]);

            // port entries: "445/open/tcp//microsoft-ds///"
            for entry in caps[2].split(',') {
                let fields: Vec<&str> = entry.trim().split('/').collect();
                if fields.len() < 5 || fields[1] != "open" {
                    continue;
                }
                let Ok(port) = fields[0].parse::<u16>() else {
                    continue;
                };
                host.open_ports.insert(port);
                if !fields[4].is_empty() {
                    host.services.insert(fields[4].to_string());
                }
            }

            if !host.open_ports.is_empty() {
                finding.add_host(host);
            }
        }

        Ok(finding)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{job, stdout};
    use super::*;

    const SWEEP: &str = "Host: 10.10.10.5 ()\tPorts: 88/open/tcp//kerberos-sec///, \
         389/open/tcp//ldap///, 445/open/tcp//microsoft-ds///, 636/closed/tcp//ldapssl///";

    #[test]
    fn test_extracts_open_ports_only() {
        let parser = NmapGrepParser::new();
        let lines = stdout(&[
            "# Nmap 7.94 scan initiated",
            SWEEP,
            "# Nmap done at ...",
        ]);

        let finding = parser
            .parse(&job("discovery", "10.10.0.0/24"), &lines)
            .unwrap();

        let host = &finding.hosts["10.10.10.5"];
        assert_eq!(
            host.open_ports.iter().copied().collect::<Vec<_>>(),
            vec![88, 389, 445]
        );
        assert!(host.services.contains("ldap"));
        assert!(!host.open_ports.contains(&636));
    }

    #[test]
    fn test_multiple_hosts() {
        let parser = NmapGrepParser::new();
        let lines = stdout(&[
            "Host: 10.10.10.5 ()\tPorts: 445/open/tcp//microsoft-ds///",
            "Host: 10.10.10.6 (dc01)\tPorts: 88/open/tcp//kerberos-sec///",
        ]);

        let finding = parser
            .parse(&job("discovery", "10.10.10.0/24"), &lines)
            .unwrap();
        assert_eq!(finding.hosts.len(), 2);
    }

    #[test]
    fn test_malformed_output_is_empty() {
        let parser = NmapGrepParser::new();
        let lines = stdout(&["Starting Nmap", "garbage with no host line", ""]);
        let finding = parser.parse(&job("discovery", "10.0.0.1"), &lines).unwrap();
        assert!(finding.is_empty());
    }

    #[test]
    fn test_matches_discovery_and_script_jobs() {
        let parser = NmapGrepParser::new();
        assert!(parser.matches(&job("discovery", "t")));
        assert!(parser.matches(&job("smb-scripts", "t")));
        assert!(!parser.matches(&job("cme", "t")));
    }
}

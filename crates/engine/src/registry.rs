//! Parser Registry
//!
//! Holds the pluggable output parsers and runs every matching one
//! against a terminal job. Parser faults are logged and treated as an
//! empty finding; they never abort the pass for other parsers.

use std::sync::Arc;

use krait_core::{Finding, Job, OutputLine};
use krait_ports::OutputParser;
use tracing::warn;

use crate::parsers;

/// Result of running the registry over one job.
pub struct ParseOutcome {
    pub finding: Finding,
    /// Names of the parsers whose predicate matched, faulted or not.
    pub matched: Vec<String>,
}

#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn OutputParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in AD tool parsers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(parsers::NmapGrepParser::new()));
        registry.register(Arc::new(parsers::CmeJsonParser::new()));
        registry.register(Arc::new(parsers::AsRepParser::new()));
        registry.register(Arc::new(parsers::SecretsDumpParser::new()));
        registry.register(Arc::new(parsers::Enum4LinuxParser::new()));
        registry
    }

    pub fn register(&mut self, parser: Arc<dyn OutputParser>) {
        self.parsers.push(parser);
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Run all matching parsers and union-merge their findings.
    pub fn parse_all(&self, job: &Job, lines: &[OutputLine]) -> ParseOutcome {
        let mut finding = Finding::default();
        let mut matched = Vec::new();

        for parser in &self.parsers {
            if !parser.matches(job) {
                continue;
            }
            matched.push(parser.name().to_string());
            match parser.parse(job, lines) {
                Ok(extracted) => finding.merge(extracted),
                Err(e) => {
                    warn!(
                        parser = parser.name(),
                        job = %job.id,
                        error = %e,
                        "parser fault, treating as empty finding"
                    );
                }
            }
        }

        ParseOutcome { finding, matched }
    }
}

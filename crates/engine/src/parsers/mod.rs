//! Built-in output parsers for common AD tooling.
//!
//! Each parser is heuristic: it recognizes the output shape of one tool
//! and extracts what it can. Malformed or unrelated input produces an
//! empty finding, never an error.

mod cme;
mod enum4linux;
mod impacket;
mod nmap;

pub use cme::CmeJsonParser;
pub use enum4linux::Enum4LinuxParser;
pub use impacket::{AsRepParser, SecretsDumpParser};
pub use nmap::NmapGrepParser;

use krait_core::{OutputLine, OutputSource};

/// Stdout lines only; parsers never key off stderr noise.
pub(crate) fn stdout_lines(lines: &[OutputLine]) -> impl Iterator<Item = &OutputLine> {
    lines
        .iter()
        .filter(|line| line.source == OutputSource::Stdout)
}

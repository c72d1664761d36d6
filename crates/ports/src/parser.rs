//! Output Parser Port
//!
//! Pluggable detectors over completed job output. Parsers are pure with
//! respect to external state: they read only the job and its captured
//! lines. A parser that cannot make sense of its input returns an empty
//! finding rather than an error; `Err` is reserved for internal faults.

use krait_core::{Finding, Job, OutputLine, Result};

pub trait OutputParser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Predicate over a terminal job, typically matched on the job-type
    /// tag. Multiple parsers may match the same job.
    fn matches(&self, job: &Job) -> bool;

    fn parse(&self, job: &Job, lines: &[OutputLine]) -> Result<Finding>;
}

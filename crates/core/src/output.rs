//! Captured job output lines

use crate::error::EngineError;
use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of an output line.
///
/// `System` lines are synthesized by the engine itself, e.g. process
/// start and exit markers or launch failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSource {
    Stdout,
    Stderr,
    System,
}

impl OutputSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for OutputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputSource {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            "system" => Ok(Self::System),
            other => Err(EngineError::Storage(format!(
                "unknown output source: {other}"
            ))),
        }
    }
}

/// One captured line of job output, immutable once written.
///
/// `seq` is assigned by the store and is strictly monotonic within a
/// job; interleaving between stdout and stderr follows append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLine {
    pub job_id: JobId,
    pub seq: i64,
    pub timestamp: DateTime<Utc>,
    pub source: OutputSource,
    pub text: String,
}

//! Error types shared across the engine

use crate::job::{JobId, JobStatus};
use thiserror::Error;

/// Base error type for the orchestration engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("meta for job {0} is writable only after a terminal status")]
    MetaBeforeTerminal(JobId),

    #[error("launch failure: {0}")]
    LaunchFailure(String),

    #[error("parser {parser} fault: {message}")]
    ParserFault { parser: String, message: String },

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("no applicable credential for target {0}")]
    NoCredential(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("event bus error: {0}")]
    Bus(String),
}

impl EngineError {
    pub fn invalid_transition(from: JobStatus, to: JobStatus) -> Self {
        Self::InvalidTransition { from, to }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

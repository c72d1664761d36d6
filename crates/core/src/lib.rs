//! Domain Core - Business Logic and Shared Types
//!
//! This crate contains the domain entities of the orchestration engine:
//! jobs and their state machine, captured output lines, discovered
//! credentials, and the findings parsers extract from completed output.

pub mod credential;
pub mod error;
pub mod finding;
pub mod job;
pub mod output;

pub use chrono::{DateTime, Utc};

pub use crate::credential::{Credential, SecretKind};
pub use crate::error::{EngineError, Result};
pub use crate::finding::{Finding, FollowUp, FollowUpClass, HostObservation};
pub use crate::job::{Job, JobId, JobStatus};
pub use crate::output::{OutputLine, OutputSource};

//! Orchestration Engine
//!
//! Ties the job store, process runner, parser registry, and session store
//! into a feedback-driven pipeline: completed jobs are parsed into
//! findings, findings update shared state, and policy turns them into
//! newly scheduled work.

pub mod catalog;
pub mod inventory;
pub mod orchestrator;
pub mod parsers;
pub mod policy;
pub mod registry;
pub mod runner;

pub use inventory::HostInventory;
pub use orchestrator::Orchestrator;
pub use policy::FollowUpPolicy;
pub use registry::{ParseOutcome, ParserRegistry};
pub use runner::ProcessRunner;

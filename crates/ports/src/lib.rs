//! Port interfaces for the orchestration engine.
//!
//! Adapters implement these traits; the engine and server depend only on
//! the interfaces, never on concrete storage or transport.

pub mod event_bus;
pub mod job_store;
pub mod parser;
pub mod session_store;

pub use event_bus::{EventPublisher, EventReceiver, EventSubscriber, JobEvent};
pub use job_store::JobStore;
pub use parser::OutputParser;
pub use session_store::{SessionStore, UpsertOutcome};

//! Concrete adapters behind the krait ports: sqlite-backed job store,
//! in-memory broadcast event bus, session store, and environment-driven
//! configuration.

pub mod bus;
pub mod config;
pub mod sessions;
pub mod sqlite;

pub use bus::InMemoryBus;
pub use config::{ConfigError, EngineConfig};
pub use sessions::InMemorySessionStore;
pub use sqlite::SqliteJobStore;

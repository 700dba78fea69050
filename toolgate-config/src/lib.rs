//! Configuration management for the invocation engine.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigResult};
pub use schema::EngineConfig;

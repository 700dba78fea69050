//! Core shared types for the toolgate invocation engine.

#![warn(missing_docs, clippy::pedantic)]

mod context;
mod error;
mod ids;
mod panic;

/// Request-scoped identity carried through every pipeline stage.
pub use context::ToolContext;
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier correlating every trace event of one request.
pub use ids::TraceId;
/// Message extraction for caught panics.
pub use panic::panic_message;

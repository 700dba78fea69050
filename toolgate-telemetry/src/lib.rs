//! Observability for the invocation pipeline.
//!
//! [`trace`] holds the per-engine forensic record of stage transitions;
//! [`tracing_support`] wires the operator-facing `tracing` output.

#![warn(missing_docs, clippy::pedantic)]

pub mod trace;
pub mod tracing_support;

pub use trace::{MemoryTraceSink, TraceEvent, TraceSink};
pub use tracing_support::TelemetryError;

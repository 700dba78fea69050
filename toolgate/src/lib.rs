//! Tool invocation engine facade.
//!
//! Depend on this crate via `cargo add toolgate`. It bundles the component
//! crates behind feature flags so downstream users can pull in only the
//! pieces they need, e.g. just `tools` to define tools for an engine that
//! lives in another process.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use toolgate_primitives as primitives;

/// Call pipeline orchestration (enabled by `engine` feature).
#[cfg(feature = "engine")]
pub use toolgate_engine as engine;

/// Tool definitions, argument coercion and output normalization (enabled by
/// `tools` feature).
#[cfg(feature = "tools")]
pub use toolgate_tools as tools;

/// Guardrails (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use toolgate_policy as policy;

/// Trace sinks and log setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use toolgate_telemetry as telemetry;

/// Engine configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use toolgate_config as config;

/// Types needed to define tools and run calls.
#[cfg(feature = "engine")]
pub mod prelude {
    pub use toolgate_config::EngineConfig;
    pub use toolgate_engine::{Engine, ErrorKind, ToolResult};
    pub use toolgate_policy::{GuardStage, Guardrail, GuardrailError, GuardrailPipeline};
    pub use toolgate_primitives::{ToolContext, TraceId};
    pub use toolgate_telemetry::{MemoryTraceSink, TraceSink};
    pub use toolgate_tools::{ArgType, Registry, Tool, ToolFailure, ToolOutput, ToolSpec};
}

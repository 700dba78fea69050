//! Dispatch core for tool calls.
//!
//! [`Engine`] resolves a tool by name, decodes and coerces its raw
//! arguments, consults a result cache, runs input guardrails, invokes the
//! tool with bounded retries, normalizes the output, runs output guardrails
//! and stores the result. Every stage is recorded in the engine's trace sink
//! and every failure is folded into the returned [`ToolResult`].

#![warn(missing_docs, clippy::pedantic)]

mod cache;
mod engine;
mod invoke;
mod result;
mod tracer;

pub use cache::{CacheLookup, CacheStore, MemoryCacheStore, ResultCache};
pub use engine::{Engine, EngineBuilder};
pub use result::{ErrorKind, ToolResult};

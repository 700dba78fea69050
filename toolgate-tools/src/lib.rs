//! Tool definitions and the pure stages of the invocation pipeline.
//!
//! A [`Tool`](registry::Tool) pairs a name and a [`ToolSpec`](spec::ToolSpec)
//! with a callable body. The [`args`] module turns the raw argument payload
//! into typed arguments and the [`output`] module finalizes whatever the body
//! returned into the canonical shape cached and shown to guardrails.

#![warn(missing_docs, clippy::pedantic)]

pub mod args;
pub mod output;
pub mod registry;
pub mod spec;

pub use args::{Arguments, ArgsError, coerce_arguments, decode_arguments, parse_arguments};
pub use output::ToolOutput;
pub use registry::{
    Invocation, Registry, RegistryBuilder, RegistryResult, Tool, ToolBody, ToolError,
    ToolFailure, ToolFuture, ToolReturn,
};
pub use spec::{ArgType, ToolSpec};

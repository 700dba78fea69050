//! Guardrails evaluated around tool invocation.
//!
//! A [`Guardrail`] inspects the request context, the tool name and either the
//! coerced arguments (input stage) or the normalized output (output stage).
//! Guardrails are grouped into an ordered [`GuardrailPipeline`] that stops at
//! the first rejection.

#![warn(missing_docs, clippy::pedantic)]

pub mod guardrail;
pub mod pipeline;
pub mod rules;

pub use guardrail::{FnGuardrail, GuardStage, Guardrail, GuardrailError, GuardrailResult, from_fn};
pub use pipeline::{GuardrailPipeline, GuardrailRejection};
pub use rules::{DenyTools, MaxOutputBytes, RequireUser};

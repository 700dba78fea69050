//! Guardrail trait and error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use toolgate_primitives::ToolContext;

/// Errors raised by guardrails.
#[derive(Debug, Error)]
pub enum GuardrailError {
    /// The guarded data violates policy. The call is blocked.
    #[error("{0}")]
    Violation(String),
    /// The guardrail itself failed. Treated as a defect, not a block.
    #[error(transparent)]
    Defect(#[from] anyhow::Error),
}

impl GuardrailError {
    /// Creates a policy violation with the supplied reason.
    #[must_use]
    pub fn violation(reason: impl Into<String>) -> Self {
        Self::Violation(reason.into())
    }

    /// Returns `true` for a policy violation.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Violation(_))
    }
}

/// Result alias for guardrail checks.
pub type GuardrailResult<T> = Result<T, GuardrailError>;

/// Point in the pipeline at which a guardrail runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardStage {
    /// Before invocation, over the coerced arguments.
    Input,
    /// After invocation, over the normalized output.
    Output,
}

impl GuardStage {
    /// Returns the stage label used in trace event names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for GuardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy predicate evaluated over one pipeline stage.
pub trait Guardrail: Send + Sync {
    /// Short name identifying the guardrail in traces and logs.
    fn name(&self) -> &str;

    /// Checks `data` for the call to `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`GuardrailError::Violation`] to block the call, or
    /// [`GuardrailError::Defect`] when the check itself could not run.
    fn check(&self, ctx: &ToolContext, tool: &str, data: &Value) -> GuardrailResult<()>;
}

/// Guardrail backed by a closure. Built with [`from_fn`].
pub struct FnGuardrail<F> {
    name: String,
    check: F,
}

impl<F> fmt::Debug for FnGuardrail<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGuardrail")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Wraps a closure as a named guardrail.
#[must_use]
pub fn from_fn<F>(name: impl Into<String>, check: F) -> FnGuardrail<F>
where
    F: Fn(&ToolContext, &str, &Value) -> GuardrailResult<()> + Send + Sync,
{
    FnGuardrail {
        name: name.into(),
        check,
    }
}

impl<F> Guardrail for FnGuardrail<F>
where
    F: Fn(&ToolContext, &str, &Value) -> GuardrailResult<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &ToolContext, tool: &str, data: &Value) -> GuardrailResult<()> {
        (self.check)(ctx, tool, data)
    }
}

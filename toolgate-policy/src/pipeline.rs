//! Ordered guardrail evaluation.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::Value;
use thiserror::Error;
use toolgate_primitives::{ToolContext, panic_message};
use tracing::{debug, warn};

use crate::guardrail::{Guardrail, GuardrailError};

/// Rejection produced by the first guardrail that failed.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct GuardrailRejection {
    guard: String,
    source: GuardrailError,
}

impl GuardrailRejection {
    /// Returns the name of the guardrail that rejected the call.
    #[must_use]
    pub fn guard(&self) -> &str {
        &self.guard
    }

    /// Returns the underlying guardrail error.
    #[must_use]
    pub fn error(&self) -> &GuardrailError {
        &self.source
    }

    /// Returns `true` when the rejection is a policy violation rather than a
    /// defect in the guardrail.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        self.source.is_violation()
    }
}

/// Ordered list of guardrails sharing one stage.
///
/// Pipelines are cheap to clone; guardrails are held behind `Arc` so one
/// pipeline can be shared by several engines.
#[derive(Clone, Default)]
pub struct GuardrailPipeline {
    guards: Vec<Arc<dyn Guardrail>>,
}

impl fmt::Debug for GuardrailPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardrailPipeline")
            .field("guards", &self.names())
            .finish()
    }
}

impl GuardrailPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a guardrail, returning the updated pipeline for chaining.
    #[must_use]
    pub fn with<G>(mut self, guard: G) -> Self
    where
        G: Guardrail + 'static,
    {
        self.push(Arc::new(guard));
        self
    }

    /// Appends a shared guardrail.
    pub fn push(&mut self, guard: Arc<dyn Guardrail>) {
        self.guards.push(guard);
    }

    /// Names of the guardrails in evaluation order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.guards.iter().map(|guard| guard.name()).collect()
    }

    /// Number of guardrails.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Whether the pipeline has no guardrails.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Runs every guardrail in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns a [`GuardrailRejection`] naming the guardrail that failed.
    /// Guardrails after it are not evaluated. A guardrail that panics is
    /// reported as a [`GuardrailError::Defect`].
    pub fn run(&self, ctx: &ToolContext, tool: &str, data: &Value) -> Result<(), GuardrailRejection> {
        for guard in &self.guards {
            if let Err(source) = check_guarded(guard.as_ref(), ctx, tool, data) {
                debug!(guard = guard.name(), tool, error = %source, "guardrail rejected call");
                return Err(GuardrailRejection {
                    guard: guard.name().to_owned(),
                    source,
                });
            }
        }
        Ok(())
    }
}

fn check_guarded(
    guard: &dyn Guardrail,
    ctx: &ToolContext,
    tool: &str,
    data: &Value,
) -> Result<(), GuardrailError> {
    panic::catch_unwind(AssertUnwindSafe(|| guard.check(ctx, tool, data))).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(guard = guard.name(), tool, error = %message, "guardrail panicked");
        Err(GuardrailError::Defect(anyhow!("guardrail `{}` panicked: {message}", guard.name())))
    })
}

impl FromIterator<Arc<dyn Guardrail>> for GuardrailPipeline {
    fn from_iter<T: IntoIterator<Item = Arc<dyn Guardrail>>>(iter: T) -> Self {
        Self {
            guards: iter.into_iter().collect(),
        }
    }
}

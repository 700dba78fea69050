//! Request-scoped context passed to tools and guardrails.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, TraceId};

/// Immutable identity of a single tool request.
///
/// The context is created by the caller, handed to the engine by reference
/// and cloned into tool bodies; no stage mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    trace_id: TraceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl ToolContext {
    /// Creates an anonymous context for the supplied trace.
    #[must_use]
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            user_id: None,
        }
    }

    /// Creates an anonymous context with a freshly generated trace id.
    #[must_use]
    pub fn random() -> Self {
        Self::new(TraceId::random())
    }

    /// Attaches the identifier of the user on whose behalf the call runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUserId`] when the identifier is blank.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::InvalidUserId {
                reason: "user id cannot be empty",
            });
        }
        self.user_id = Some(user_id);
        Ok(self)
    }

    /// Returns the trace identifier.
    #[must_use]
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Returns the user identifier, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

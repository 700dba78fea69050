//! Call outcomes and the failure taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use toolgate_policy::GuardStage;
use toolgate_tools::ArgsError;

/// Category of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// No tool is registered under the requested name.
    UnknownTool,
    /// The raw arguments could not be decoded or coerced.
    BadArgs,
    /// A guardrail blocked the call.
    Guardrail {
        /// Stage at which the call was blocked.
        stage: GuardStage,
    },
    /// The tool rejected its input.
    UserError,
    /// The tool failed, exhausted its retries, or a guardrail was defective.
    ToolError,
    /// An asynchronous attempt exceeded its deadline.
    Timeout,
}

/// Stage failure. `Display` renders the message exposed on [`ToolResult`].
#[derive(Debug, Error)]
pub(crate) enum PipelineError {
    #[error("unknown_tool")]
    UnknownTool,
    #[error("bad_args:{0}")]
    BadArgs(#[from] ArgsError),
    #[error("guardrail:{reason}")]
    Guardrail { stage: GuardStage, reason: String },
    #[error("user_error:{0}")]
    UserError(String),
    #[error("tool_error:timeout")]
    Timeout,
    #[error("tool_error:{0}")]
    Tool(String),
}

impl PipelineError {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool => ErrorKind::UnknownTool,
            Self::BadArgs(_) => ErrorKind::BadArgs,
            Self::Guardrail { stage, .. } => ErrorKind::Guardrail { stage: *stage },
            Self::UserError(_) => ErrorKind::UserError,
            Self::Timeout => ErrorKind::Timeout,
            Self::Tool(_) => ErrorKind::ToolError,
        }
    }
}

/// Outcome of one engine call.
///
/// Exactly one of [`output`](Self::output) and
/// [`error_message`](Self::error_message) is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    tool_name: String,
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    attempts: u32,
    cached: bool,
}

impl ToolResult {
    pub(crate) fn success(tool_name: &str, output: Value, attempts: u32) -> Self {
        Self {
            tool_name: tool_name.to_owned(),
            ok: true,
            output: Some(output),
            error_message: None,
            error_kind: None,
            attempts,
            cached: false,
        }
    }

    pub(crate) fn from_cache(tool_name: &str, output: Value) -> Self {
        Self {
            cached: true,
            ..Self::success(tool_name, output, 0)
        }
    }

    pub(crate) fn failure(tool_name: &str, error: &PipelineError, attempts: u32) -> Self {
        Self {
            tool_name: tool_name.to_owned(),
            ok: false,
            output: None,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind()),
            attempts,
            cached: false,
        }
    }

    /// Name of the requested tool.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Whether the call succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Normalized output of a successful call.
    #[must_use]
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Consumes the result, returning the output of a successful call.
    #[must_use]
    pub fn into_output(self) -> Option<Value> {
        self.output
    }

    /// Taxonomy-prefixed message of a failed call, e.g. `bad_args:bad_int:x`.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Category of a failed call.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    /// Attempts made to invoke the tool; `0` when it never ran.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the output was served from the cache.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

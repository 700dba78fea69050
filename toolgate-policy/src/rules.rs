//! Built-in guardrails.

use std::collections::BTreeSet;

use serde_json::Value;
use toolgate_primitives::ToolContext;

use crate::guardrail::{Guardrail, GuardrailError, GuardrailResult};

/// Blocks invocation of the listed tools.
#[derive(Debug, Clone)]
pub struct DenyTools {
    names: BTreeSet<String>,
    reason: Option<String>,
}

impl DenyTools {
    /// Creates a guardrail denying the supplied tool names.
    ///
    /// Blank names are ignored.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| !name.trim().is_empty())
            .collect();
        Self {
            names,
            reason: None,
        }
    }

    /// Overrides the violation message.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl Guardrail for DenyTools {
    fn name(&self) -> &str {
        "deny_tools"
    }

    fn check(&self, _ctx: &ToolContext, tool: &str, _data: &Value) -> GuardrailResult<()> {
        if !self.names.contains(tool) {
            return Ok(());
        }
        let reason = self
            .reason
            .clone()
            .unwrap_or_else(|| format!("tool `{tool}` is disabled"));
        Err(GuardrailError::Violation(reason))
    }
}

/// Blocks calls made without a user identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireUser;

impl Guardrail for RequireUser {
    fn name(&self) -> &str {
        "require_user"
    }

    fn check(&self, ctx: &ToolContext, _tool: &str, _data: &Value) -> GuardrailResult<()> {
        match ctx.user_id() {
            Some(_) => Ok(()),
            None => Err(GuardrailError::violation("user required")),
        }
    }
}

/// Blocks data whose JSON encoding exceeds a byte limit.
///
/// Meant for the output stage, where it bounds what a tool may hand back.
#[derive(Debug, Clone, Copy)]
pub struct MaxOutputBytes {
    limit: usize,
}

impl MaxOutputBytes {
    /// Creates a guardrail with the supplied limit in bytes.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Returns the configured limit.
    #[must_use]
    pub const fn limit(self) -> usize {
        self.limit
    }
}

impl Guardrail for MaxOutputBytes {
    fn name(&self) -> &str {
        "max_output_bytes"
    }

    fn check(&self, _ctx: &ToolContext, _tool: &str, data: &Value) -> GuardrailResult<()> {
        let encoded = serde_json::to_vec(data).map_err(anyhow::Error::from)?;
        if encoded.len() > self.limit {
            return Err(GuardrailError::Violation(format!(
                "output is {} bytes, limit is {}",
                encoded.len(),
                self.limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use toolgate_primitives::TraceId;

    fn ctx() -> ToolContext {
        ToolContext::new(TraceId::new("t1").unwrap())
    }

    #[test]
    fn deny_tools_blocks_listed_names_only() {
        let guard = DenyTools::new(["shell", " "]);
        assert!(guard.check(&ctx(), "echo", &json!({})).is_ok());

        let err = guard.check(&ctx(), "shell", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "tool `shell` is disabled");

        let guard = DenyTools::new(["shell"]).with_reason("shell disabled in prod");
        let err = guard.check(&ctx(), "shell", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "shell disabled in prod");
    }

    #[test]
    fn require_user_checks_context() {
        let err = RequireUser.check(&ctx(), "echo", &json!({})).unwrap_err();
        assert!(err.is_violation());

        let ctx = ctx().with_user("u1").unwrap();
        assert!(RequireUser.check(&ctx, "echo", &json!({})).is_ok());
    }

    #[test]
    fn max_output_bytes_measures_json_encoding() {
        let guard = MaxOutputBytes::new(8);
        assert_eq!(guard.limit(), 8);
        assert!(guard.check(&ctx(), "t", &json!("short")).is_ok());

        let err = guard.check(&ctx(), "t", &json!("much too long")).unwrap_err();
        assert!(err.to_string().starts_with("output is 15 bytes"));
    }
}

//! Tool definitions and the name-keyed registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use toolgate_primitives::ToolContext;

use crate::args::Arguments;
use crate::output::ToolOutput;
use crate::spec::ToolSpec;

/// Result alias for tool definition and lookup.
pub type RegistryResult<T> = Result<T, ToolError>;

/// Outcome of running a tool body to completion.
pub type ToolReturn = Result<ToolOutput, ToolFailure>;

/// Future produced by tools whose body is asynchronous.
pub type ToolFuture = BoxFuture<'static, ToolReturn>;

/// What a tool body hands back when called: either the finished outcome or
/// a future the caller has to drive.
pub enum Invocation {
    /// The body completed synchronously.
    Ready(ToolReturn),
    /// The body is asynchronous and must be awaited.
    Deferred(ToolFuture),
}

impl Invocation {
    /// Returns `true` when the body still has to be driven to completion.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(outcome) => f.debug_tuple("Ready").field(outcome).finish(),
            Self::Deferred(_) => f.debug_tuple("Deferred").finish_non_exhaustive(),
        }
    }
}

/// Failure reported by a tool body.
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// The body rejected its input. Never retried.
    #[error("{0}")]
    InvalidInput(String),
    /// A transient failure worth another attempt.
    #[error("{0}")]
    Retryable(String),
    /// Any other failure. Never retried.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl ToolFailure {
    /// Creates an input rejection from the supplied reason.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Creates a retryable failure from the supplied reason.
    #[must_use]
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable(reason.into())
    }

    /// Creates an unexpected failure from a plain message.
    #[must_use]
    pub fn unexpected(reason: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Unexpected(anyhow::Error::msg(reason))
    }
}

/// Callable body of a tool.
///
/// Bodies receive an owned copy of the request context together with the
/// coerced arguments, so deferred bodies can move both into their future.
pub trait ToolBody: Send + Sync {
    /// Starts the tool with the supplied context and arguments.
    fn call(&self, ctx: ToolContext, args: Arguments) -> Invocation;
}

impl<F> ToolBody for F
where
    F: Fn(ToolContext, Arguments) -> Invocation + Send + Sync,
{
    fn call(&self, ctx: ToolContext, args: Arguments) -> Invocation {
        (self)(ctx, args)
    }
}

/// A named, schema-described callable.
#[derive(Clone)]
pub struct Tool {
    name: String,
    spec: ToolSpec,
    description: Option<String>,
    body: Arc<dyn ToolBody>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Tool {
    /// Creates a tool from any [`ToolBody`] implementation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidTool`] if the name is empty.
    pub fn new<B>(name: impl Into<String>, spec: ToolSpec, body: B) -> RegistryResult<Self>
    where
        B: ToolBody + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ToolError::InvalidTool {
                reason: "tool name cannot be empty".into(),
            });
        }

        Ok(Self {
            name,
            spec,
            description: None,
            body: Arc::new(body),
        })
    }

    /// Creates a tool whose body runs synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidTool`] if the name is empty.
    pub fn blocking<F>(name: impl Into<String>, spec: ToolSpec, body: F) -> RegistryResult<Self>
    where
        F: Fn(ToolContext, Arguments) -> ToolReturn + Send + Sync + 'static,
    {
        Self::new(name, spec, move |ctx: ToolContext, args: Arguments| {
            Invocation::Ready(body(ctx, args))
        })
    }

    /// Creates a tool whose body returns a future.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidTool`] if the name is empty.
    pub fn deferred<F, Fut>(name: impl Into<String>, spec: ToolSpec, body: F) -> RegistryResult<Self>
    where
        F: Fn(ToolContext, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolReturn> + Send + 'static,
    {
        Self::new(name, spec, move |ctx: ToolContext, args: Arguments| {
            Invocation::Deferred(Box::pin(body(ctx, args)))
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared argument schema.
    #[must_use]
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Starts the body with the supplied context and arguments.
    #[must_use]
    pub fn call(&self, ctx: ToolContext, args: Arguments) -> Invocation {
        self.body.call(ctx, args)
    }
}

/// Read-only lookup from tool name to definition.
///
/// Built once through [`RegistryBuilder`] and shared behind an `Arc`; there
/// is no way to add or remove tools afterwards.
#[derive(Clone, Default)]
pub struct Registry {
    tools: HashMap<String, Arc<Tool>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("registered", &self.names())
            .finish()
    }
}

impl Registry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds a registry from the supplied tools.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if two tools share a name.
    pub fn from_tools<I>(tools: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = Tool>,
    {
        tools
            .into_iter()
            .try_fold(Self::builder(), RegistryBuilder::register)
            .map(RegistryBuilder::build)
    }

    /// Returns the tool registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when no tool has that name.
    pub fn get(&self, name: &str) -> RegistryResult<Arc<Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_owned(),
            })
    }

    /// Returns `true` if a tool is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Lists registered tool names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Builder collecting tools before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tools: HashMap<String, Arc<Tool>>,
}

impl RegistryBuilder {
    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is already present.
    pub fn register(mut self, tool: Tool) -> RegistryResult<Self> {
        let name = tool.name().to_owned();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(self)
    }

    /// Freezes the collected tools into a [`Registry`].
    #[must_use]
    pub fn build(self) -> Registry {
        Registry { tools: self.tools }
    }
}

/// Errors produced by tool definition and lookup.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool definition failed validation.
    #[error("invalid tool: {reason}")]
    InvalidTool {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Argument schema declared an unusable type.
    #[error("invalid schema for argument `{key}`: {reason}")]
    InvalidSpec {
        /// Name of the offending argument.
        key: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },
}

//! Call pipeline orchestration.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde_json::{Value, json};
use toolgate_config::{ConfigResult, EngineConfig};
use toolgate_policy::{GuardStage, GuardrailPipeline};
use toolgate_primitives::ToolContext;
use toolgate_telemetry::{MemoryTraceSink, TraceSink};
use toolgate_tools::{Arguments, Registry, Tool, decode_arguments};
use tracing::{debug, warn};

use crate::cache::{CacheLookup, CacheStore, MemoryCacheStore, ResultCache};
use crate::invoke::{InvokeOutcome, invoke_blocking, invoke_with_deadline};
use crate::result::{PipelineError, ToolResult};
use crate::tracer::CallTrace;

/// Tool invocation engine.
///
/// One engine owns its cache and trace sink; the registry and guardrail
/// pipelines are shared read-only. Calls take `&mut self`, so concurrent use
/// of one engine must be serialized by the caller.
pub struct Engine<S = MemoryTraceSink> {
    registry: Arc<Registry>,
    config: EngineConfig,
    input_guards: Arc<GuardrailPipeline>,
    output_guards: Arc<GuardrailPipeline>,
    cache: ResultCache,
    trace: S,
}

impl<S> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("tools", &self.registry.names())
            .field("config", &self.config)
            .field("input_guards", &self.input_guards)
            .field("output_guards", &self.output_guards)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Starts building an engine over the supplied registry.
    #[must_use]
    pub fn builder(registry: Arc<Registry>) -> EngineBuilder {
        EngineBuilder {
            registry,
            config: EngineConfig::default(),
            input_guards: Arc::default(),
            output_guards: Arc::default(),
            cache_store: None,
            trace: MemoryTraceSink::new(),
        }
    }

    /// Creates an engine with no guardrails and an in-memory trace sink.
    ///
    /// # Errors
    ///
    /// Returns [`toolgate_config::ConfigError::Invalid`] when `config` fails
    /// validation.
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> ConfigResult<Self> {
        Self::builder(registry).config(config).build()
    }
}

/// Tool resolved and arguments coerced; ready to invoke.
struct PreparedCall {
    tool: Arc<Tool>,
    args: Arguments,
}

impl<S: TraceSink> Engine<S> {
    /// Runs a call on the calling thread.
    ///
    /// A tool whose body is asynchronous is driven on a private runtime. When
    /// the caller is itself inside a tokio runtime that would block the
    /// runtime's worker, so the call fails with a `tool_error:` result and
    /// [`run_async`](Self::run_async) should be used instead.
    pub fn run_bounded(&mut self, ctx: &ToolContext, name: &str, raw: &str) -> ToolResult {
        let call = match self.prepare(ctx, name, raw) {
            ControlFlow::Continue(call) => call,
            ControlFlow::Break(result) => return logged(ctx, result),
        };

        let outcome = invoke_blocking(
            &call.tool,
            ctx,
            &call.args,
            &self.config,
            CallTrace::new(&mut self.trace, ctx, name),
        );
        let result = self.complete(ctx, name, raw, outcome);
        logged(ctx, result)
    }

    /// Runs a call, bounding each asynchronous attempt by the configured
    /// timeout.
    ///
    /// Must be awaited inside a tokio runtime with the time driver enabled.
    pub async fn run_async(&mut self, ctx: &ToolContext, name: &str, raw: &str) -> ToolResult {
        let call = match self.prepare(ctx, name, raw) {
            ControlFlow::Continue(call) => call,
            ControlFlow::Break(result) => return logged(ctx, result),
        };

        let outcome = invoke_with_deadline(
            &call.tool,
            ctx,
            &call.args,
            &self.config,
            CallTrace::new(&mut self.trace, ctx, name),
        )
        .await;
        let result = self.complete(ctx, name, raw, outcome);
        logged(ctx, result)
    }

    /// Resolve, decode, consult the cache and run input guardrails.
    ///
    /// Breaks with the final result on failure or on a cache hit.
    fn prepare(&mut self, ctx: &ToolContext, name: &str, raw: &str) -> ControlFlow<ToolResult, PreparedCall> {
        let mut trace = CallTrace::new(&mut self.trace, ctx, name);

        trace.mark("tool.resolve.start");
        let tool = match self.registry.get(name) {
            Ok(tool) => {
                trace.mark("tool.resolve.ok");
                tool
            }
            Err(err) => {
                trace.emit("tool.resolve.fail", json!({ "err": err.to_string() }));
                return ControlFlow::Break(ToolResult::failure(name, &PipelineError::UnknownTool, 0));
            }
        };

        trace.mark("args.parse.start");
        let args = match decode_arguments(tool.spec(), raw) {
            Ok(args) => {
                let keys: Vec<&String> = args.keys().collect();
                trace.emit("args.parse.ok", json!({ "keys": keys }));
                args
            }
            Err(err) => {
                trace.emit("args.parse.fail", json!({ "err": err.to_string() }));
                let error = PipelineError::from(err);
                return ControlFlow::Break(ToolResult::failure(name, &error, 0));
            }
        };

        match self.cache.lookup(name, raw) {
            CacheLookup::Hit(output) => {
                trace.mark("cache.hit");
                return ControlFlow::Break(ToolResult::from_cache(name, output));
            }
            CacheLookup::Miss => trace.mark("cache.miss"),
            CacheLookup::Disabled => {}
        }

        let data = Value::Object(args.clone());
        if let Err(error) = run_guardrails(&self.input_guards, GuardStage::Input, ctx, name, &data, &mut trace) {
            return ControlFlow::Break(ToolResult::failure(name, &error, 0));
        }

        ControlFlow::Continue(PreparedCall { tool, args })
    }

    /// Normalize, run output guardrails and store the result.
    fn complete(&mut self, ctx: &ToolContext, name: &str, raw: &str, outcome: InvokeOutcome) -> ToolResult {
        let attempts = outcome.attempts;
        let output = match outcome.result {
            Ok(output) => output.normalize(name, raw),
            Err(error) => return ToolResult::failure(name, &error, attempts),
        };

        let mut trace = CallTrace::new(&mut self.trace, ctx, name);
        if let Err(error) = run_guardrails(&self.output_guards, GuardStage::Output, ctx, name, &output, &mut trace) {
            return ToolResult::failure(name, &error, attempts);
        }

        if self.cache.store(name, raw, output.clone()) {
            trace.mark("cache.store");
        }
        ToolResult::success(name, output, attempts)
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the registry tools are resolved from.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the trace sink.
    #[must_use]
    pub fn trace(&self) -> &S {
        &self.trace
    }

    /// Returns the trace sink mutably, e.g. to clear it between runs.
    pub fn trace_mut(&mut self) -> &mut S {
        &mut self.trace
    }

    /// Returns the result cache.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Returns the result cache mutably.
    pub fn cache_mut(&mut self) -> &mut ResultCache {
        &mut self.cache
    }
}

fn run_guardrails(
    pipeline: &GuardrailPipeline,
    stage: GuardStage,
    ctx: &ToolContext,
    tool: &str,
    data: &Value,
    trace: &mut CallTrace<'_>,
) -> Result<(), PipelineError> {
    let event = |outcome: &str| format!("guard.{stage}.{outcome}");

    trace.mark(&event("start"));
    match pipeline.run(ctx, tool, data) {
        Ok(()) => {
            trace.mark(&event("ok"));
            Ok(())
        }
        Err(rejection) if rejection.is_violation() => {
            let reason = rejection.to_string();
            trace.emit(&event("block"), json!({ "reason": reason, "guard": rejection.guard() }));
            Err(PipelineError::Guardrail { stage, reason })
        }
        Err(rejection) => {
            let reason = rejection.to_string();
            trace.emit(&event("fail"), json!({ "err": reason, "guard": rejection.guard() }));
            Err(PipelineError::Tool(reason))
        }
    }
}

fn logged(ctx: &ToolContext, result: ToolResult) -> ToolResult {
    if result.is_ok() {
        debug!(
            trace_id = %ctx.trace_id(),
            tool = result.tool_name(),
            attempts = result.attempts(),
            cached = result.is_cached(),
            "tool call succeeded"
        );
    } else {
        warn!(
            trace_id = %ctx.trace_id(),
            tool = result.tool_name(),
            attempts = result.attempts(),
            error = result.error_message().unwrap_or_default(),
            "tool call failed"
        );
    }
    result
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S = MemoryTraceSink> {
    registry: Arc<Registry>,
    config: EngineConfig,
    input_guards: Arc<GuardrailPipeline>,
    output_guards: Arc<GuardrailPipeline>,
    cache_store: Option<Box<dyn CacheStore>>,
    trace: S,
}

impl<S> fmt::Debug for EngineBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("tools", &self.registry.names())
            .field("config", &self.config)
            .field("custom_cache_store", &self.cache_store.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: TraceSink> EngineBuilder<S> {
    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the guardrails run on coerced arguments.
    #[must_use]
    pub fn input_guardrails(mut self, pipeline: impl Into<Arc<GuardrailPipeline>>) -> Self {
        self.input_guards = pipeline.into();
        self
    }

    /// Sets the guardrails run on normalized output.
    #[must_use]
    pub fn output_guardrails(mut self, pipeline: impl Into<Arc<GuardrailPipeline>>) -> Self {
        self.output_guards = pipeline.into();
        self
    }

    /// Replaces the in-memory cache backend.
    #[must_use]
    pub fn cache_store(mut self, store: impl CacheStore + 'static) -> Self {
        self.cache_store = Some(Box::new(store));
        self
    }

    /// Replaces the trace sink.
    #[must_use]
    pub fn trace_sink<T: TraceSink>(self, sink: T) -> EngineBuilder<T> {
        EngineBuilder {
            registry: self.registry,
            config: self.config,
            input_guards: self.input_guards,
            output_guards: self.output_guards,
            cache_store: self.cache_store,
            trace: sink,
        }
    }

    /// Validates the configuration and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`toolgate_config::ConfigError::Invalid`] when the
    /// configuration fails validation.
    pub fn build(self) -> ConfigResult<Engine<S>> {
        self.config.validate()?;
        let store = self
            .cache_store
            .unwrap_or_else(|| Box::new(MemoryCacheStore::new()));

        Ok(Engine {
            registry: self.registry,
            config: self.config,
            input_guards: self.input_guards,
            output_guards: self.output_guards,
            cache: ResultCache::new(self.config.enable_cache(), store),
            trace: self.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::Map;
    use toolgate_config::ConfigError;
    use toolgate_primitives::TraceId;
    use toolgate_tools::{ToolOutput, ToolSpec};

    fn registry() -> Arc<Registry> {
        let echo = Tool::blocking("echo", ToolSpec::new(), |_ctx, args| {
            Ok(ToolOutput::plain(Value::Object(args)))
        })
        .unwrap();
        Arc::new(Registry::from_tools([echo]).unwrap())
    }

    fn ctx() -> ToolContext {
        ToolContext::new(TraceId::new("t1").unwrap())
    }

    /// Sink that only counts events.
    #[derive(Default)]
    struct CountingSink(usize);

    impl TraceSink for CountingSink {
        fn emit(&mut self, _name: &str, _payload: &Map<String, Value>) {
            self.0 += 1;
        }
    }

    #[test]
    fn build_rejects_zero_timeout() {
        let config = EngineConfig::new().with_async_timeout(Duration::ZERO);
        let err = Engine::new(registry(), config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn custom_trace_sink_receives_events() {
        let mut engine = Engine::builder(registry())
            .trace_sink(CountingSink::default())
            .build()
            .unwrap();

        let result = engine.run_bounded(&ctx(), "echo", r#"{"a":1}"#);
        assert!(result.is_ok());
        // resolve(2) + parse(2) + miss + guard.input(2) + invoke(2) + guard.output(2) + store
        assert_eq!(engine.trace().0, 12);
    }

    #[test]
    fn custom_cache_store_is_used() {
        let mut store = MemoryCacheStore::new();
        store.put("echo", "{}", json!("primed"));
        let mut engine = Engine::builder(registry()).cache_store(store).build().unwrap();

        let result = engine.run_bounded(&ctx(), "echo", "{}");
        assert!(result.is_cached());
        assert_eq!(result.output(), Some(&json!("primed")));
        assert_eq!(engine.cache().hits(), 1);
    }

    #[test]
    fn accessors_expose_collaborators() {
        let mut engine = Engine::new(registry(), EngineConfig::new().with_cache(false)).unwrap();
        assert!(!engine.config().enable_cache());
        assert!(engine.registry().contains("echo"));
        assert!(!engine.cache().is_enabled());

        engine.run_bounded(&ctx(), "echo", "");
        assert!(!engine.trace().is_empty());
        engine.trace_mut().clear();
        assert!(engine.trace().is_empty());
    }

    #[test]
    fn clearing_the_cache_forces_a_fresh_invocation() {
        let mut engine = Engine::new(registry(), EngineConfig::default()).unwrap();
        assert!(!engine.run_bounded(&ctx(), "echo", "{}").is_cached());
        assert!(engine.run_bounded(&ctx(), "echo", "{}").is_cached());

        engine.cache_mut().clear();
        assert!(engine.cache().is_empty());
        let result = engine.run_bounded(&ctx(), "echo", "{}");
        assert!(!result.is_cached());
        assert_eq!(result.attempts(), 1);
    }

    #[test]
    fn async_call_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let mut engine = Engine::new(registry(), EngineConfig::default()).unwrap();
        let ctx = ctx();
        let future = engine.run_async(&ctx, "echo", "{}");
        assert_send(&future);
    }
}

//! Retry state machine around a single tool body.
//!
//! Both entry points share [`RetryLoop`]; they differ only in how one
//! attempt runs. The blocking path calls the body directly and drives a
//! deferred body on a private current-thread runtime. The deadline path
//! awaits a deferred body under the configured timeout, which adds the
//! terminal timeout transition.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures::FutureExt;
use serde_json::json;
use tokio::runtime::{Builder, Handle};
use toolgate_config::EngineConfig;
use toolgate_primitives::{ToolContext, panic_message};
use toolgate_tools::{Arguments, Invocation, Tool, ToolFailure, ToolFuture, ToolOutput, ToolReturn};
use tracing::warn;

use crate::result::PipelineError;
use crate::tracer::CallTrace;

/// Outcome of the invocation stage.
pub(crate) struct InvokeOutcome {
    pub(crate) result: Result<ToolOutput, PipelineError>,
    pub(crate) attempts: u32,
}

/// How a single attempt ended.
enum Attempt {
    Finished(ToolReturn),
    TimedOut,
    /// The body could not be run to completion, or panicked.
    Unavailable(String),
}

struct RetryLoop {
    max_retries: u32,
    attempts: u32,
}

impl RetryLoop {
    fn new(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries(),
            attempts: 0,
        }
    }

    fn begin(&mut self) {
        self.attempts += 1;
    }

    fn has_budget(&self) -> bool {
        self.attempts <= self.max_retries
    }

    fn settle(
        &self,
        attempt: Attempt,
        trace: &mut CallTrace<'_>,
    ) -> ControlFlow<Result<ToolOutput, PipelineError>> {
        let n = self.attempts;
        match attempt {
            Attempt::Finished(Ok(output)) => {
                trace.emit("tool.invoke.ok", json!({ "attempts": n }));
                ControlFlow::Break(Ok(output))
            }
            Attempt::Finished(Err(ToolFailure::InvalidInput(reason))) => {
                trace.emit("tool.invoke.user_error", json!({ "attempt": n, "err": reason }));
                ControlFlow::Break(Err(PipelineError::UserError(reason)))
            }
            Attempt::Finished(Err(ToolFailure::Retryable(reason))) => {
                trace.emit("tool.invoke.retryable", json!({ "attempt": n, "err": reason }));
                if self.has_budget() {
                    warn!(attempt = n, error = %reason, "retryable tool failure, retrying");
                    ControlFlow::Continue(())
                } else {
                    warn!(attempt = n, error = %reason, "retries exhausted");
                    ControlFlow::Break(Err(PipelineError::Tool(reason)))
                }
            }
            Attempt::Finished(Err(failure @ ToolFailure::Unexpected(_))) => {
                let reason = failure.to_string();
                trace.emit("tool.invoke.fail", json!({ "attempt": n, "err": reason }));
                ControlFlow::Break(Err(PipelineError::Tool(reason)))
            }
            Attempt::Unavailable(reason) => {
                trace.emit("tool.invoke.fail", json!({ "attempt": n, "err": reason }));
                ControlFlow::Break(Err(PipelineError::Tool(reason)))
            }
            Attempt::TimedOut => {
                trace.emit("tool.invoke.timeout", json!({ "attempt": n }));
                ControlFlow::Break(Err(PipelineError::Timeout))
            }
        }
    }
}

/// Invokes `tool` on the calling thread.
pub(crate) fn invoke_blocking(
    tool: &Tool,
    ctx: &ToolContext,
    args: &Arguments,
    config: &EngineConfig,
    mut trace: CallTrace<'_>,
) -> InvokeOutcome {
    trace.mark("tool.invoke.start");
    let mut retry = RetryLoop::new(config);
    loop {
        retry.begin();
        let attempt = attempt_blocking(tool, ctx, args);
        if let ControlFlow::Break(result) = retry.settle(attempt, &mut trace) {
            return InvokeOutcome {
                result,
                attempts: retry.attempts,
            };
        }
    }
}

/// Invokes `tool`, bounding every deferred attempt by the configured timeout.
///
/// Must be polled from within a tokio runtime with the time driver enabled.
pub(crate) async fn invoke_with_deadline(
    tool: &Tool,
    ctx: &ToolContext,
    args: &Arguments,
    config: &EngineConfig,
    mut trace: CallTrace<'_>,
) -> InvokeOutcome {
    trace.mark("tool.invoke.start");
    let mut retry = RetryLoop::new(config);
    loop {
        retry.begin();
        let attempt = attempt_with_deadline(tool, ctx, args, config.async_timeout()).await;
        if let ControlFlow::Break(result) = retry.settle(attempt, &mut trace) {
            return InvokeOutcome {
                result,
                attempts: retry.attempts,
            };
        }
    }
}

fn attempt_blocking(tool: &Tool, ctx: &ToolContext, args: &Arguments) -> Attempt {
    let invocation = match start(tool, ctx, args) {
        Ok(invocation) => invocation,
        Err(payload) => return panicked(&payload),
    };
    match invocation {
        Invocation::Ready(outcome) => Attempt::Finished(outcome),
        Invocation::Deferred(future) => match run_to_completion(future) {
            Ok(Ok(outcome)) => Attempt::Finished(outcome),
            Ok(Err(payload)) => panicked(&payload),
            Err(reason) => Attempt::Unavailable(reason),
        },
    }
}

async fn attempt_with_deadline(
    tool: &Tool,
    ctx: &ToolContext,
    args: &Arguments,
    deadline: Duration,
) -> Attempt {
    let invocation = match start(tool, ctx, args) {
        Ok(invocation) => invocation,
        Err(payload) => return panicked(&payload),
    };
    match invocation {
        Invocation::Ready(outcome) => Attempt::Finished(outcome),
        Invocation::Deferred(future) => {
            match tokio::time::timeout(deadline, AssertUnwindSafe(future).catch_unwind()).await {
                Ok(Ok(outcome)) => Attempt::Finished(outcome),
                Ok(Err(payload)) => panicked(&payload),
                Err(_) => Attempt::TimedOut,
            }
        }
    }
}

type PanicPayload = Box<dyn Any + Send>;

/// Calls the body, catching a panic raised before it hands back an
/// [`Invocation`].
fn start(tool: &Tool, ctx: &ToolContext, args: &Arguments) -> Result<Invocation, PanicPayload> {
    panic::catch_unwind(AssertUnwindSafe(|| tool.call(ctx.clone(), args.clone())))
}

fn panicked(payload: &PanicPayload) -> Attempt {
    let message = panic_message(payload.as_ref());
    warn!(error = %message, "tool body panicked");
    Attempt::Unavailable(format!("panicked: {message}"))
}

/// Drives `future` to completion on a fresh current-thread runtime.
///
/// Refuses when the calling thread already runs inside a tokio runtime:
/// blocking there would stall the caller's scheduler. A panic inside the
/// future is caught and handed back as its payload.
fn run_to_completion(future: ToolFuture) -> Result<Result<ToolReturn, PanicPayload>, String> {
    if Handle::try_current().is_ok() {
        return Err(
            "cannot block on an asynchronous tool inside a running async runtime; use run_async"
                .to_owned(),
        );
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("failed to start runtime for asynchronous tool: {err}"))?;
    Ok(runtime.block_on(AssertUnwindSafe(future).catch_unwind()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use toolgate_primitives::TraceId;
    use toolgate_telemetry::MemoryTraceSink;
    use toolgate_tools::ToolSpec;

    fn ctx() -> ToolContext {
        ToolContext::new(TraceId::new("t1").unwrap())
    }

    fn flaky(failures: u32) -> (Tool, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let tool = Tool::blocking("flaky", ToolSpec::new(), move |_ctx, _args| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= failures {
                Err(ToolFailure::retryable(format!("transient {call}")))
            } else {
                Ok(ToolOutput::plain(call))
            }
        })
        .unwrap();
        (tool, calls)
    }

    #[test]
    fn retries_until_success_within_budget() {
        let (tool, calls) = flaky(2);
        let mut sink = MemoryTraceSink::new();
        let ctx = ctx();
        let config = EngineConfig::new().with_max_retries(2);

        let outcome = invoke_blocking(
            &tool,
            &ctx,
            &Arguments::new(),
            &config,
            CallTrace::new(&mut sink, &ctx, "flaky"),
        );

        assert_eq!(outcome.result.unwrap(), ToolOutput::plain(3));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sink.names(),
            [
                "tool.invoke.start",
                "tool.invoke.retryable",
                "tool.invoke.retryable",
                "tool.invoke.ok"
            ]
        );
    }

    #[test]
    fn exhausted_retries_surface_last_failure() {
        let (tool, calls) = flaky(10);
        let mut sink = MemoryTraceSink::new();
        let ctx = ctx();
        let config = EngineConfig::new().with_max_retries(1);

        let outcome = invoke_blocking(
            &tool,
            &ctx,
            &Arguments::new(),
            &config,
            CallTrace::new(&mut sink, &ctx, "flaky"),
        );

        let err = outcome.result.unwrap_err();
        assert_eq!(err.to_string(), "tool_error:transient 2");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let (tool, calls) = flaky(1);
        let mut sink = MemoryTraceSink::new();
        let ctx = ctx();
        let config = EngineConfig::new().with_max_retries(0);

        let outcome = invoke_blocking(
            &tool,
            &ctx,
            &Arguments::new(),
            &config,
            CallTrace::new(&mut sink, &ctx, "flaky"),
        );

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn user_errors_are_not_retried() {
        let tool = Tool::blocking("picky", ToolSpec::new(), |_ctx, _args| {
            Err(ToolFailure::invalid_input("n must be positive"))
        })
        .unwrap();
        let mut sink = MemoryTraceSink::new();
        let ctx = ctx();
        let config = EngineConfig::new().with_max_retries(3);

        let outcome = invoke_blocking(
            &tool,
            &ctx,
            &Arguments::new(),
            &config,
            CallTrace::new(&mut sink, &ctx, "picky"),
        );

        assert_eq!(
            outcome.result.unwrap_err().to_string(),
            "user_error:n must be positive"
        );
        assert_eq!(outcome.attempts, 1);
        assert_eq!(sink.names().last(), Some(&"tool.invoke.user_error"));
    }

    #[test]
    fn blocking_path_drives_deferred_body_outside_runtime() {
        let tool = Tool::deferred("later", ToolSpec::new(), |_ctx, _args| async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(ToolOutput::plain("done"))
        })
        .unwrap();
        let mut sink = MemoryTraceSink::new();
        let ctx = ctx();

        let outcome = invoke_blocking(
            &tool,
            &ctx,
            &Arguments::new(),
            &EngineConfig::default(),
            CallTrace::new(&mut sink, &ctx, "later"),
        );

        assert_eq!(outcome.result.unwrap(), ToolOutput::plain("done"));
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn panicking_body_is_terminal_failure() {
        let tool = Tool::blocking("buggy", ToolSpec::new(), |_ctx, _args| panic!("index out of range"))
            .unwrap();
        let mut sink = MemoryTraceSink::new();
        let ctx = ctx();
        let config = EngineConfig::new().with_max_retries(3);

        let outcome = invoke_blocking(
            &tool,
            &ctx,
            &Arguments::new(),
            &config,
            CallTrace::new(&mut sink, &ctx, "buggy"),
        );

        assert_eq!(
            outcome.result.unwrap_err().to_string(),
            "tool_error:panicked: index out of range"
        );
        assert_eq!(outcome.attempts, 1);
        assert_eq!(sink.names(), ["tool.invoke.start", "tool.invoke.fail"]);
    }

    #[tokio::test]
    async fn deadline_path_times_out_without_retry() {
        let tool = Tool::deferred("slow", ToolSpec::new(), |_ctx, _args| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ToolOutput::Null)
        })
        .unwrap();
        let mut sink = MemoryTraceSink::new();
        let ctx = ctx();
        let config = EngineConfig::new()
            .with_max_retries(4)
            .with_async_timeout(Duration::from_millis(10));

        let outcome = invoke_with_deadline(
            &tool,
            &ctx,
            &Arguments::new(),
            &config,
            CallTrace::new(&mut sink, &ctx, "slow"),
        )
        .await;

        assert!(matches!(outcome.result, Err(PipelineError::Timeout)));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(sink.names(), ["tool.invoke.start", "tool.invoke.timeout"]);
    }
}

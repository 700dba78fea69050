//! Per-call view over the engine's trace sink.

use serde_json::{Map, Value};
use toolgate_primitives::ToolContext;
use toolgate_telemetry::TraceSink;
use tracing::debug;

/// Stamps every event of one call with its trace id and tool name.
pub(crate) struct CallTrace<'a> {
    sink: &'a mut dyn TraceSink,
    trace_id: &'a str,
    tool: &'a str,
}

impl<'a> CallTrace<'a> {
    pub(crate) fn new(sink: &'a mut dyn TraceSink, ctx: &'a ToolContext, tool: &'a str) -> Self {
        Self {
            sink,
            trace_id: ctx.trace_id().as_str(),
            tool,
        }
    }

    /// Records an event carrying only the identifying fields.
    pub(crate) fn mark(&mut self, event: &str) {
        self.emit(event, Value::Null);
    }

    /// Records an event; the fields of `extra`, when it is an object, are
    /// merged into the payload.
    pub(crate) fn emit(&mut self, event: &str, extra: Value) {
        let mut payload = Map::new();
        payload.insert("trace_id".to_owned(), Value::from(self.trace_id));
        payload.insert("tool_name".to_owned(), Value::from(self.tool));
        if let Value::Object(fields) = extra {
            payload.extend(fields);
        }

        debug!(event, trace_id = self.trace_id, tool = self.tool, "trace event");
        self.sink.emit(event, &payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use toolgate_primitives::TraceId;
    use toolgate_telemetry::MemoryTraceSink;

    #[test]
    fn stamps_identity_and_merges_fields() {
        let mut sink = MemoryTraceSink::new();
        let ctx = ToolContext::new(TraceId::new("t1").unwrap());
        {
            let mut trace = CallTrace::new(&mut sink, &ctx, "echo");
            trace.mark("tool.resolve.start");
            trace.emit("tool.invoke.retryable", json!({"attempt": 1, "err": "flaky"}));
        }

        let events = sink.events();
        assert_eq!(events[0].payload().len(), 2);
        assert_eq!(events[0].get("trace_id"), Some(&json!("t1")));
        assert_eq!(events[1].get("tool_name"), Some(&json!("echo")));
        assert_eq!(events[1].get("attempt"), Some(&json!(1)));
    }
}

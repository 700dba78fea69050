//! Append-only trace of pipeline stage events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One recorded stage transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    name: String,
    payload: Map<String, Value>,
}

impl TraceEvent {
    /// Creates an event owning the supplied payload.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Returns the dotted event name, e.g. `tool.invoke.ok`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the payload snapshot.
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Returns a single payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Destination for trace events.
///
/// Implementations must store a copy of the payload: the caller keeps
/// ownership of the map it passes in and may reuse or mutate it afterwards.
pub trait TraceSink: Send {
    /// Records an event.
    fn emit(&mut self, name: &str, payload: &Map<String, Value>);
}

/// In-memory sink keeping every event in emission order.
#[derive(Debug, Clone, Default)]
pub struct MemoryTraceSink {
    events: Vec<TraceEvent>,
}

impl MemoryTraceSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Returns the recorded event names, oldest first.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(TraceEvent::name).collect()
    }

    /// Returns the events whose payload carries the supplied trace id.
    pub fn events_for<'a>(&'a self, trace_id: &'a str) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events
            .iter()
            .filter(move |event| event.get("trace_id").and_then(Value::as_str) == Some(trace_id))
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops all recorded events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl TraceSink for MemoryTraceSink {
    fn emit(&mut self, name: &str, payload: &Map<String, Value>) {
        self.events.push(TraceEvent::new(name, payload.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn events_keep_emission_order() {
        let mut sink = MemoryTraceSink::new();
        sink.emit("tool.resolve.start", &Map::new());
        sink.emit("tool.resolve.ok", &Map::new());
        assert_eq!(sink.names(), ["tool.resolve.start", "tool.resolve.ok"]);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn payloads_are_snapshots() {
        let mut sink = MemoryTraceSink::new();
        let mut payload = Map::new();
        payload.insert("tool_name".into(), json!("echo"));
        payload.insert("keys".into(), json!(["a"]));

        sink.emit("args.parse.ok", &payload);
        payload.insert("tool_name".into(), json!("mutated"));
        if let Some(Value::Array(keys)) = payload.get_mut("keys") {
            keys.push(json!("b"));
        }

        let event = &sink.events()[0];
        assert_eq!(event.get("tool_name"), Some(&json!("echo")));
        assert_eq!(event.get("keys"), Some(&json!(["a"])));
    }

    #[test]
    fn filters_by_trace_id() {
        let mut sink = MemoryTraceSink::new();
        for trace_id in ["a", "b", "a"] {
            let mut payload = Map::new();
            payload.insert("trace_id".into(), json!(trace_id));
            sink.emit("cache.miss", &payload);
        }
        assert_eq!(sink.events_for("a").count(), 2);
        assert_eq!(sink.events_for("c").count(), 0);
    }
}

//! Tool return values and their canonical form.

use bytes::Bytes;
use serde_json::{Map, Value, json};

/// Value returned by a tool body.
///
/// The variant tells the normalizer how to finalize the output; see
/// [`ToolOutput::normalize`].
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutput {
    /// No value.
    Null,
    /// Opaque binary payload. Only its length reaches the canonical form.
    Bytes(Bytes),
    /// Object fields to which the raw argument string is attached as `raw`.
    EchoRaw(Map<String, Value>),
    /// Object fields nested under `data` next to the invoking tool's name.
    Wrapped(Map<String, Value>),
    /// Any other value, passed through unchanged.
    Plain(Value),
}

impl ToolOutput {
    /// Wraps any JSON-convertible value as a plain output.
    #[must_use]
    pub fn plain(value: impl Into<Value>) -> Self {
        Self::Plain(value.into())
    }

    /// Finalizes the output into the canonical JSON shape.
    ///
    /// `tool_name` and `raw` are the invoking tool and its raw argument
    /// string. Both a [`ToolOutput::Null`] and a plain JSON `null` become the
    /// string `"null"`.
    #[must_use]
    pub fn normalize(self, tool_name: &str, raw: &str) -> Value {
        match self {
            Self::Null | Self::Plain(Value::Null) => Value::from("null"),
            Self::Bytes(bytes) => json!({ "type": "bytes", "len": bytes.len() }),
            Self::EchoRaw(mut fields) => {
                fields.insert("raw".to_owned(), Value::from(raw));
                Value::Object(fields)
            }
            Self::Wrapped(fields) => json!({ "tool": tool_name, "data": fields }),
            Self::Plain(value) => value,
        }
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            other => Self::Plain(other),
        }
    }
}

impl From<Bytes> for ToolOutput {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for ToolOutput {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn null_becomes_literal_string() {
        assert_eq!(ToolOutput::Null.normalize("t", "{}"), json!("null"));
        assert_eq!(ToolOutput::from(Value::Null).normalize("t", "{}"), json!("null"));
    }

    #[test]
    fn bytes_are_described_not_embedded() {
        let out = ToolOutput::from(vec![0_u8, 1, 2, 3]).normalize("t", "");
        assert_eq!(out, json!({"type": "bytes", "len": 4}));
    }

    #[test]
    fn echo_raw_attaches_raw_arguments() {
        let raw = r#"{ "x":1 }"#;
        let out = ToolOutput::EchoRaw(fields(json!({"seen": true}))).normalize("echo", raw);
        assert_eq!(out, json!({"seen": true, "raw": raw}));
    }

    #[test]
    fn wrapped_nests_fields_under_data() {
        let out = ToolOutput::Wrapped(fields(json!({"n": 2}))).normalize("adder", "{}");
        assert_eq!(out, json!({"tool": "adder", "data": {"n": 2}}));
    }

    #[test]
    fn plain_values_pass_through() {
        let value = json!({"_wrap": true, "n": 1});
        assert_eq!(ToolOutput::Plain(value.clone()).normalize("t", "{}"), value);
        assert_eq!(ToolOutput::plain(5).normalize("t", "{}"), json!(5));
    }
}

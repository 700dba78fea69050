//! Argument schemas declared by tools.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::{RegistryResult, ToolError};

/// Primitive type an argument is coerced to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    /// Signed integer; decimal strings are accepted.
    Int,
    /// Boolean; the strings `"true"` and `"false"` are accepted.
    Bool,
    /// String; no conversion is performed.
    Str,
}

impl ArgType {
    /// Returns the textual tag used in schemas and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Str => "str",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a textual type tag is not one of the known types.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown argument type `{0}`")]
pub struct UnknownArgType(pub String);

impl FromStr for ArgType {
    type Err = UnknownArgType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Self::Int),
            "bool" => Ok(Self::Bool),
            "str" => Ok(Self::Str),
            other => Err(UnknownArgType(other.to_owned())),
        }
    }
}

/// Declared argument schema for a tool.
///
/// The schema refines the caller's arguments rather than whitelisting them:
/// keys that are not declared pass through coercion untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(default)]
    schema: BTreeMap<String, ArgType>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    defaults: Map<String, Value>,
}

impl ToolSpec {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from textual type tags.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidSpec`] for the first tag that is not one of
    /// `int`, `bool` or `str`.
    pub fn from_tags<I, K, T>(tags: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: AsRef<str>,
    {
        let mut spec = Self::new();
        for (key, tag) in tags {
            let key = key.into();
            let arg_type = tag
                .as_ref()
                .parse::<ArgType>()
                .map_err(|err| ToolError::InvalidSpec {
                    key: key.clone(),
                    reason: err.to_string(),
                })?;
            spec.schema.insert(key, arg_type);
        }
        Ok(spec)
    }

    /// Declares an argument of the supplied type.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, arg_type: ArgType) -> Self {
        self.schema.insert(name.into(), arg_type);
        self
    }

    /// Declares a default applied when the caller omits `name`.
    ///
    /// Defaults are applied before coercion, so a default for a declared key
    /// is coerced like any caller-supplied value.
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Returns the declared argument types keyed by name.
    #[must_use]
    pub fn schema(&self) -> &BTreeMap<String, ArgType> {
        &self.schema
    }

    /// Returns the declared defaults keyed by name.
    #[must_use]
    pub fn defaults(&self) -> &Map<String, Value> {
        &self.defaults
    }

    /// Returns the declared type for `name`, if any.
    #[must_use]
    pub fn arg_type(&self, name: &str) -> Option<ArgType> {
        self.schema.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tags_accepts_known_types() {
        let spec = ToolSpec::from_tags([("x", "int"), ("flag", "bool"), ("name", "str")]).unwrap();
        assert_eq!(spec.arg_type("x"), Some(ArgType::Int));
        assert_eq!(spec.arg_type("flag"), Some(ArgType::Bool));
        assert_eq!(spec.arg_type("name"), Some(ArgType::Str));
        assert_eq!(spec.arg_type("missing"), None);
    }

    #[test]
    fn from_tags_rejects_unknown_type() {
        let err = ToolSpec::from_tags([("x", "float")]).expect_err("float is not a known type");
        assert!(matches!(err, ToolError::InvalidSpec { ref key, .. } if key == "x"));
        assert!(err.to_string().contains("float"));
    }

    #[test]
    fn spec_deserializes_from_json() {
        let spec: ToolSpec = serde_json::from_value(serde_json::json!({
            "schema": {"x": "int", "loud": "bool"},
            "defaults": {"loud": "false"}
        }))
        .unwrap();
        assert_eq!(spec.arg_type("loud"), Some(ArgType::Bool));
        assert_eq!(spec.defaults().get("loud"), Some(&Value::from("false")));

        let bad = serde_json::from_value::<ToolSpec>(serde_json::json!({
            "schema": {"x": "decimal"}
        }));
        assert!(bad.is_err());
    }
}

use serde_json::{Map, Value};
use std::fmt;

/// Untyped mapping read back from persistence.
///
/// Its shape may be older than the current [`PersistedState`](crate::state::PersistedState),
/// so it only ever flows into the migration chain.
pub type RawState = Map<String, Value>;

/// Coarse JSON value kind, used to report type mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    List,
    Mapping,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Mapping,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
            Self::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

/// Returns the value stored under `key`, treating JSON `null` as absent.
pub fn present<'a>(raw: &'a RawState, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|value| !value.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_kind_names() {
        assert_eq!(ValueKind::of(&json!([1, 2])).to_string(), "list");
        assert_eq!(ValueKind::of(&json!({"a": 1})).to_string(), "mapping");
        assert_eq!(ValueKind::of(&json!("x")), ValueKind::String);
        assert_eq!(ValueKind::of(&json!(1.5)), ValueKind::Number);
    }

    #[test]
    fn test_present_skips_null() {
        let raw = json!({"a": null, "b": true});
        let raw = raw.as_object().unwrap();
        assert!(present(raw, "a").is_none());
        assert!(present(raw, "missing").is_none());
        assert_eq!(present(raw, "b"), Some(&json!(true)));
    }
}

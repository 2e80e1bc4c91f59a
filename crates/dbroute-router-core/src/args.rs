//! Routing key extraction from call arguments
//!
//! The routing key value of a call is either a whole argument whose name
//! matches the key, or a field of that name on a composite argument.
//! Only scalar values (strings, numbers, booleans) can route a call.

use serde::Serialize;
use serde_json::Value;

/// Source of a routing key value
pub trait RouteKeySource {
    /// Canonical string value of `key`, if present and scalar
    fn route_value(&self, key: &str) -> Option<String>;
}

impl<T: RouteKeySource + ?Sized> RouteKeySource for &T {
    fn route_value(&self, key: &str) -> Option<String> {
        (**self).route_value(key)
    }
}

/// Canonical string form of a scalar JSON value
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl RouteKeySource for Value {
    fn route_value(&self, key: &str) -> Option<String> {
        self.as_object()
            .and_then(|fields| fields.get(key))
            .and_then(scalar_to_string)
    }
}

/// Named arguments of one intercepted call, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    args: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// Append a composite argument by serializing it
    pub fn with_serialized<T: Serialize + ?Sized>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(self.with(name, serde_json::to_value(value)?))
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl RouteKeySource for CallArgs {
    fn route_value(&self, key: &str) -> Option<String> {
        // A whole argument named like the key wins over composite fields
        let whole = self
            .args
            .iter()
            .filter(|(name, _)| name == key)
            .find_map(|(_, value)| scalar_to_string(value));

        whole.or_else(|| self.args.iter().find_map(|(_, value)| value.route_value(key)))
    }
}

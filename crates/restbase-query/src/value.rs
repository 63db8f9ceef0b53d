//! Filter values and bind parameters.

use serde_json::{Number, Value};

/// A filter value, resolved once at parse time.
///
/// The parser only produces `String`, `Bool`, `Null` and `StringArray`;
/// `Number` exists for filters built in code.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
    StringArray(Vec<String>),
}

impl FilterValue {
    /// Whether the value is a number or a string that looks like one.
    pub fn is_numeric(&self) -> bool {
        match self {
            Self::Number(_) => true,
            Self::String(s) => looks_numeric(s),
            _ => false,
        }
    }

    /// Text form of a scalar value, as `->>` would produce it.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Null | Self::StringArray(_) => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringArray(value)
    }
}

/// Returns `true` for strings such as `10`, `-3.5` or `1e6`.
///
/// This is a shape check only; `inf` and `NaN` are not numeric here even
/// though Rust's float parser accepts them.
pub fn looks_numeric(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty()
        && s.bytes().any(|b| b.is_ascii_digit())
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
        && s.parse::<f64>().is_ok_and(f64::is_finite)
}

/// SQL value types for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    TextArray(Vec<String>),
    Json(Value),
    /// A pgvector literal such as `[1,2,3]`, bound as text and cast.
    Vector(String),
    Null,
}

impl SqlValue {
    /// Numeric parameter from a number-shaped string.
    pub fn numeric(s: &str) -> Option<Self> {
        let s = s.trim();
        if !looks_numeric(s) {
            return None;
        }
        s.parse::<i64>()
            .map(Self::Integer)
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(Self::Float))
    }

    /// Parameter for a JSON number, preferring integers.
    pub fn from_number(n: &Number) -> Self {
        n.as_i64()
            .map(Self::Integer)
            .or_else(|| n.as_f64().map(Self::Float))
            .unwrap_or_else(|| Self::Text(n.to_string()))
    }

    /// Parameter for a JSON document value, used by insert/update payloads.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => Self::from_number(n),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Json(value.clone()),
        }
    }

    /// Vector parameter from any accepted vector input shape.
    pub fn vector(value: &Value) -> Self {
        Self::Vector(vector_literal_from_json(value))
    }

    /// Whether the placeholder needs a `::vector` cast.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    /// JSON rendering for logs and CLI output.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) | Self::Vector(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Boolean(b) => Value::Bool(*b),
            Self::TextArray(items) => Value::from(items.clone()),
            Self::Json(v) => v.clone(),
            Self::Null => Value::Null,
        }
    }
}

/// Normalize a comma-separated vector string to `[n1,n2,...]`.
///
/// Missing or duplicated brackets are corrected rather than rejected.
pub fn vector_literal_from_str(input: &str) -> String {
    let inner = input
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let parts: Vec<&str> = inner
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    format!("[{}]", parts.join(","))
}

/// Format a numeric slice as a vector literal.
pub fn vector_literal_from_slice<T: ToString>(values: &[T]) -> String {
    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(","))
}

/// Format a string, number array or mixed sequence as a vector literal.
pub fn vector_literal_from_json(value: &Value) -> String {
    match value {
        Value::String(s) => vector_literal_from_str(s),
        Value::Number(n) => format!("[{n}]"),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::Number(n) => Some(n.to_string()),
                    Value::String(s) => {
                        let s = s.trim();
                        (!s.is_empty()).then(|| s.to_string())
                    }
                    _ => None,
                })
                .collect();
            format!("[{}]", parts.join(","))
        }
        _ => "[]".to_string(),
    }
}

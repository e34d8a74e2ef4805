//! # Field Values
//!
//! Dynamically-typed data carried inside transcript cells.
//!
//! Senders put whatever they like into a cell (`rating`, `span`, `offset`,
//! `flashX`, free-form extras). Everything is normalized into the closed
//! [`Value`] type so the merge and view code never inspects raw JSON.

use serde::Serialize;
use std::fmt;

/// A single field value inside a cell entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    /// Convert a JSON value into a field value.
    ///
    /// `null` has no counterpart and yields `None`; nested objects are kept
    /// as their compact JSON text.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        use serde_json::Value as Json;

        match json {
            Json::Null => None,
            Json::Bool(b) => Some(Value::Bool(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            Json::String(s) => Some(Value::Text(s.clone())),
            Json::Array(items) => Some(Value::List(
                items.iter().filter_map(Value::from_json).collect(),
            )),
            Json::Object(_) => Some(Value::Text(json.to_string())),
        }
    }

    /// Parse one token of a legacy `::` message.
    ///
    /// Tokens with a `.` are tried as floats, others as integers, then as
    /// booleans; anything left over stays text.
    pub fn parse_token(token: &str) -> Self {
        let numeric = if token.contains('.') {
            token.parse::<f64>().ok().map(Value::Float)
        } else {
            token.parse::<i64>().ok().map(Value::Int)
        };

        if let Some(value) = numeric {
            return value;
        }

        if token.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if token.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else {
            Value::Text(token.to_string())
        }
    }

    /// Parse the raw value part of a legacy `::` message.
    ///
    /// Commas count as separators. One token gives a scalar, anything else a list.
    pub fn parse_raw(raw: &str) -> Self {
        let normalized = raw.replace(',', " ");
        let mut tokens: Vec<Value> = normalized.split_whitespace().map(Value::parse_token).collect();

        if tokens.len() == 1 {
            tokens.remove(0)
        } else {
            Value::List(tokens)
        }
    }

    /// Truthiness as senders use it for the `flashX` marker
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Whether a stored rating counts as "not rated yet".
    ///
    /// Empty list, empty text, `false` and numeric zero all qualify.
    pub fn is_blank_rating(&self) -> bool {
        match self {
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bool(b) => !*b,
            Value::List(items) => items.is_empty(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

// Same text Python's `str` gives a float: shortest round-trip digits,
// exponent form outside [1e-4, 1e16).
fn fmt_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        return f.write_str("nan");
    }
    if value.is_infinite() {
        return f.write_str(if value > 0.0 { "inf" } else { "-inf" });
    }

    let magnitude = value.abs();
    if magnitude >= 1e16 || (magnitude != 0.0 && magnitude < 1e-4) {
        let text = format!("{:e}", value);
        let (mantissa, exponent) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        write!(f, "{}e{}{:0>2}", mantissa, sign, digits)
    } else if value.fract() == 0.0 {
        write!(f, "{:.1}", value)
    } else {
        write!(f, "{}", value)
    }
}

/// Textual form, used as the span-group key
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => fmt_float(f, *x),
            Value::Text(s) => f.write_str(s),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::Text(s) => write!(f, "'{}'", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

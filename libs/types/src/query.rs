//! Typed request parameters and their wire formatting
//!
//! Request descriptors carry parameters as [`QueryValue`]s so callers can pass
//! lists, dates and structured filters without stringifying them by hand.
//! [`format_request_params`] applies the backend's conventions:
//!
//! - arrays are joined into a single comma-separated value
//! - objects are serialized as compact JSON
//! - dates are ISO-8601 with millisecond precision in UTC (`2023-01-01T00:00:00.000Z`)
//! - null values are omitted entirely

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

/// Request parameters keyed by name. Ordered so query strings are stable.
pub type QueryParams = BTreeMap<String, QueryValue>;

/// A single request parameter value before wire formatting
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Absent value, dropped during formatting
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    Array(Vec<QueryValue>),
    /// Structured value sent as JSON text
    Object(serde_json::Value),
}

impl QueryValue {
    /// Check whether this value is dropped from the formatted parameters
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// Render the value the way the backend expects it on the query string.
    ///
    /// Returns `None` for [`QueryValue::Null`]. Null entries inside an array
    /// render as empty strings so positional meaning is preserved.
    pub fn render(&self) -> Option<String> {
        match self {
            QueryValue::Null => None,
            QueryValue::Bool(value) => Some(value.to_string()),
            QueryValue::Int(value) => Some(value.to_string()),
            QueryValue::Float(value) => Some(value.to_string()),
            QueryValue::Str(value) => Some(value.clone()),
            QueryValue::Date(value) => Some(value.to_rfc3339_opts(SecondsFormat::Millis, true)),
            QueryValue::Array(items) => Some(
                items
                    .iter()
                    .map(|item| item.render().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            QueryValue::Object(value) => Some(value.to_string()),
        }
    }
}

/// Format typed parameters into the string pairs placed on the request URL
pub fn format_request_params(params: &QueryParams) -> BTreeMap<String, String> {
    params
        .iter()
        .filter_map(|(key, value)| value.render().map(|rendered| (key.clone(), rendered)))
        .collect()
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

macro_rules! impl_from_small_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    QueryValue::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_small_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        QueryValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for QueryValue {
    fn from(value: usize) -> Self {
        QueryValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f32> for QueryValue {
    fn from(value: f32) -> Self {
        QueryValue::Float(f64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Str(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        QueryValue::Str(value.clone())
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(value: DateTime<Utc>) -> Self {
        QueryValue::Date(value)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        QueryValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(QueryValue::Null)
    }
}

impl From<serde_json::Value> for QueryValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => QueryValue::Int(i),
                None => QueryValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => QueryValue::Str(s),
            Value::Array(items) => {
                QueryValue::Array(items.into_iter().map(QueryValue::from).collect())
            }
            object @ Value::Object(_) => QueryValue::Object(object),
        }
    }
}

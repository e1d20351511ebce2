//! Field values held by a form.
//!
//! A [`FieldValue`] is the dynamic value of one field: a scalar, a sequence,
//! a nested object or an opaque binary [`Blob`] (an uploaded file). Values keep
//! insertion order so the transport payload is stable.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Mapping from field name to current value.
pub type Values = IndexMap<String, FieldValue>;

/// An opaque binary value, typically an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Raw content.
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Create a new blob.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size of the content in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// The dynamic value of a single field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value.
    #[default]
    Null,
    /// Boolean (checkboxes, toggles).
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    String(String),
    /// Ordered sequence of values.
    Array(Vec<FieldValue>),
    /// Nested object.
    Object(IndexMap<String, FieldValue>),
    /// Binary content.
    Blob(Blob),
}

impl FieldValue {
    /// The empty string, returned for fields that have no value yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::String(String::new())
    }

    /// Web-form truthiness: empty string, zero, NaN, null and false are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Blob(_) => true,
        }
    }

    /// Coerce to a number the way form inputs are coerced.
    ///
    /// Returns `None` when the value is not numeric.
    #[must_use]
    pub fn to_number(&self) -> Option<f64> {
        let n = match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => parse_numeric(s)?,
            Self::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => parse_numeric(&single.to_form_string())?,
                _ => return None,
            },
            Self::Object(_) | Self::Blob(_) => return None,
        };
        (!n.is_nan()).then_some(n)
    }

    /// Length used by length rules, or `None` for kinds that have no length.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::Number(n) => Some(format_number(*n).chars().count()),
            Self::Array(items) => Some(items.len()),
            Self::Blob(blob) => Some(blob.size()),
            Self::Object(map) => Some(map.len()),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// String form used for pattern checks and text payload entries.
    ///
    /// Null becomes the empty string, sequences are comma-joined, objects are
    /// rendered as JSON and blobs as their file name.
    #[must_use]
    pub fn to_form_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Array(items) => items
                .iter()
                .map(Self::to_form_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => serde_json::to_string(self).unwrap_or_default(),
            Self::Blob(blob) => blob.file_name.clone(),
        }
    }
}

/// Parse a numeric string after trimming; blank strings count as zero.
fn parse_numeric(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    match trimmed {
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        // Rust accepts "inf"/"nan" spellings that forms do not
        _ if trimmed.chars().any(char::is_alphabetic)
            && !trimmed.contains(['e', 'E']) =>
        {
            None
        }
        _ => trimmed.parse::<f64>().ok(),
    }
}

/// Render a number without a trailing `.0` for integral values.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_form_string())
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Blob(blob) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("fileName", &blob.file_name)?;
                map.serialize_entry("contentType", &blob.content_type)?;
                map.serialize_entry("size", &blob.size())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for FieldValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Blob> for FieldValue {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Build a [`Values`] map from a JSON object. Non-objects yield an empty map.
#[must_use]
pub fn values_from_json(json: serde_json::Value) -> Values {
    match FieldValue::from(json) {
        FieldValue::Object(map) => map,
        _ => Values::new(),
    }
}

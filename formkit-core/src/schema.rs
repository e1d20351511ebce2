//! Field constraint sets and the two-phase effective schema.
//!
//! A [`Schema`] maps field names to [`FieldSchema`] rule sets. Forms own an
//! [`EffectiveSchema`]: the static base supplied at construction plus a
//! separately owned overlay of rules registered lazily when a field is bound.
//! The overlay is merged over the base on read, so registration never
//! replaces a field's existing rules wholesale.
//!
//! Schemas deserialize from the JSON form used by form configuration files:
//!
//! ```text
//! {
//!   "username": { "required": "Pick a username", "minLength": 3 },
//!   "age":      { "min": [18, "Adults only"], "max": 130 },
//!   "plan":     { "oneOf": [["free", "pro"], "Unknown plan"] }
//! }
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{FormkitError, FormkitResult};
use crate::value::FieldValue;

/// Mapping from field name to its rule set.
pub type Schema = IndexMap<String, FieldSchema>;

/// Parse a schema from JSON text.
///
/// # Errors
///
/// Returns [`FormkitError::Schema`] if the JSON is malformed, a rule has the
/// wrong shape, or a pattern fails to compile.
pub fn parse_schema(json: &str) -> FormkitResult<Schema> {
    serde_json::from_str(json).map_err(|e| FormkitError::Schema(e.to_string()))
}

/// A rule bound with an optional custom message (`5` or `[5, "message"]`).
#[derive(Debug, Clone, PartialEq)]
pub struct Rule<T> {
    /// The constraint value.
    pub value: T,
    /// Message overriding the default one.
    pub message: Option<String>,
}

impl<T> Rule<T> {
    /// A rule using the default message.
    pub fn new(value: T) -> Self {
        Self {
            value,
            message: None,
        }
    }

    /// A rule with a custom message.
    pub fn with_message(value: T, message: impl Into<String>) -> Self {
        Self {
            value,
            message: Some(message.into()),
        }
    }

    /// The custom message, or the one produced by `default`.
    pub fn message_or_else(&self, default: impl FnOnce(&T) -> String) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| default(&self.value))
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Rule<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Array(pair)
                if pair.len() == 2 && matches!(pair[1], serde_json::Value::String(_)) =>
            {
                let mut pair = pair.into_iter();
                let value = pair.next().unwrap_or_default();
                let message = pair.next().and_then(|m| m.as_str().map(str::to_string));
                let value = serde_json::from_value(value).map_err(D::Error::custom)?;
                Ok(Self {
                    value,
                    message,
                })
            }
            other => serde_json::from_value(other)
                .map(Self::new)
                .map_err(D::Error::custom),
        }
    }
}

/// Presence rule. `message` overrides the default "`{name}` is required".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Required {
    /// Custom message.
    pub message: Option<String>,
}

fn deserialize_required<'de, D>(deserializer: D) -> Result<Option<Required>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RequiredRepr {
        Flag(bool),
        Message(String),
    }

    Ok(match Option::<RequiredRepr>::deserialize(deserializer)? {
        None | Some(RequiredRepr::Flag(false)) => None,
        Some(RequiredRepr::Flag(true)) => Some(Required::default()),
        Some(RequiredRepr::Message(message)) => Some(Required {
            message: Some(message),
        }),
    })
}

/// A compiled regular expression used by pattern rules.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`FormkitError::Schema`] if the expression does not compile.
    pub fn parse(source: &str) -> FormkitResult<Self> {
        Regex::new(source)
            .map(Self)
            .map_err(|e| FormkitError::Schema(format!("invalid pattern '{source}': {e}")))
    }

    /// Test whether the pattern matches anywhere in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    /// The source of the expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self(regex)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}

/// Enumeration rule.
///
/// The serialized form is either a bare list of allowed values or a
/// `[list, message]` pair; a pair is recognised by its first element being a
/// list itself.
fn deserialize_one_of<'de, D>(deserializer: D) -> Result<Option<Rule<Vec<FieldValue>>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let Some(items) = Option::<Vec<serde_json::Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if !matches!(items.first(), Some(serde_json::Value::Array(_))) {
        return Ok(Some(Rule::new(
            items.into_iter().map(FieldValue::from).collect(),
        )));
    }

    let mut items = items.into_iter();
    match (items.next(), items.next(), items.next()) {
        (Some(serde_json::Value::Array(allowed)), Some(serde_json::Value::String(message)), None) => {
            Ok(Some(Rule::with_message(
                allowed.into_iter().map(FieldValue::from).collect(),
                message,
            )))
        }
        _ => Err(D::Error::custom(
            "oneOf pair must be [allowed values, message]",
        )),
    }
}

/// The rule set of one field. Every constraint is optional.
///
/// Constraints are evaluated in declaration order: required, min, max,
/// minLength, maxLength, pattern, oneOf.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldSchema {
    /// Value must be truthy.
    #[serde(default, deserialize_with = "deserialize_required")]
    pub required: Option<Required>,
    /// Inclusive numeric lower bound.
    #[serde(default)]
    pub min: Option<Rule<f64>>,
    /// Inclusive numeric upper bound.
    #[serde(default)]
    pub max: Option<Rule<f64>>,
    /// Inclusive lower length bound.
    #[serde(default)]
    pub min_length: Option<Rule<usize>>,
    /// Inclusive upper length bound.
    #[serde(default)]
    pub max_length: Option<Rule<usize>>,
    /// Pattern the stringified value must match.
    #[serde(default)]
    pub pattern: Option<Rule<Pattern>>,
    /// Allowed values.
    #[serde(default, deserialize_with = "deserialize_one_of")]
    pub one_of: Option<Rule<Vec<FieldValue>>>,
}

impl FieldSchema {
    /// An empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a truthy value.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = Some(Required::default());
        self
    }

    /// Require a truthy value, with a custom message.
    #[must_use]
    pub fn required_with(mut self, message: impl Into<String>) -> Self {
        self.required = Some(Required {
            message: Some(message.into()),
        });
        self
    }

    /// Inclusive lower numeric bound.
    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(Rule::new(min));
        self
    }

    /// Inclusive lower numeric bound with a custom message.
    #[must_use]
    pub fn min_with(mut self, min: f64, message: impl Into<String>) -> Self {
        self.min = Some(Rule::with_message(min, message));
        self
    }

    /// Inclusive upper numeric bound.
    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(Rule::new(max));
        self
    }

    /// Inclusive upper numeric bound with a custom message.
    #[must_use]
    pub fn max_with(mut self, max: f64, message: impl Into<String>) -> Self {
        self.max = Some(Rule::with_message(max, message));
        self
    }

    /// Inclusive lower length bound.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(Rule::new(len));
        self
    }

    /// Inclusive lower length bound with a custom message.
    #[must_use]
    pub fn min_length_with(mut self, len: usize, message: impl Into<String>) -> Self {
        self.min_length = Some(Rule::with_message(len, message));
        self
    }

    /// Inclusive upper length bound.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(Rule::new(len));
        self
    }

    /// Inclusive upper length bound with a custom message.
    #[must_use]
    pub fn max_length_with(mut self, len: usize, message: impl Into<String>) -> Self {
        self.max_length = Some(Rule::with_message(len, message));
        self
    }

    /// Pattern rule.
    #[must_use]
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(Rule::new(pattern));
        self
    }

    /// Pattern rule with a custom message.
    #[must_use]
    pub fn pattern_with(mut self, pattern: Pattern, message: impl Into<String>) -> Self {
        self.pattern = Some(Rule::with_message(pattern, message));
        self
    }

    /// Enumeration rule.
    #[must_use]
    pub fn one_of<V: Into<FieldValue>>(mut self, allowed: impl IntoIterator<Item = V>) -> Self {
        self.one_of = Some(Rule::new(allowed.into_iter().map(Into::into).collect()));
        self
    }

    /// Enumeration rule with a custom message.
    #[must_use]
    pub fn one_of_with<V: Into<FieldValue>>(
        mut self,
        allowed: impl IntoIterator<Item = V>,
        message: impl Into<String>,
    ) -> Self {
        self.one_of = Some(Rule::with_message(
            allowed.into_iter().map(Into::into).collect(),
            message,
        ));
        self
    }

    /// Merge `other` over `self`: every constraint set in `other` wins,
    /// constraints `other` leaves unset are kept.
    pub fn merge(&mut self, other: &Self) {
        fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if source.is_some() {
                target.clone_from(source);
            }
        }

        overlay(&mut self.required, &other.required);
        overlay(&mut self.min, &other.min);
        overlay(&mut self.max, &other.max);
        overlay(&mut self.min_length, &other.min_length);
        overlay(&mut self.max_length, &other.max_length);
        overlay(&mut self.pattern, &other.pattern);
        overlay(&mut self.one_of, &other.one_of);
    }

    /// Check whether no constraint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Static base schema plus a store-owned overlay of lazily registered rules.
///
/// Every registration bumps [`version`](Self::version), so callers can tell
/// whether a snapshot they hold is stale.
#[derive(Debug, Clone, Default)]
pub struct EffectiveSchema {
    base: Arc<Schema>,
    overlay: Schema,
    version: u64,
}

impl EffectiveSchema {
    /// Create from a static base schema.
    #[must_use]
    pub fn new(base: Schema) -> Self {
        Self {
            base: Arc::new(base),
            overlay: Schema::new(),
            version: 0,
        }
    }

    /// Number of overlay registrations so far.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Check whether rules have been registered for `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.overlay.contains_key(name)
    }

    /// Merge `rules` into the overlay entry for `name`.
    pub fn register(&mut self, name: &str, rules: &FieldSchema) {
        self.overlay
            .entry(name.to_string())
            .or_default()
            .merge(rules);
        self.version += 1;
        tracing::debug!(field = name, version = self.version, "Registered field rules");
    }

    /// The merged rule set for one field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldSchema> {
        match (self.base.get(name), self.overlay.get(name)) {
            (None, None) => None,
            (Some(base), None) => Some(base.clone()),
            (None, Some(overlay)) => Some(overlay.clone()),
            (Some(base), Some(overlay)) => {
                let mut merged = base.clone();
                merged.merge(overlay);
                Some(merged)
            }
        }
    }

    /// The merged schema: base fields in order, then overlay-only fields.
    #[must_use]
    pub fn snapshot(&self) -> Schema {
        let mut merged = (*self.base).clone();
        for (name, rules) in &self.overlay {
            merged.entry(name.clone()).or_default().merge(rules);
        }
        merged
    }
}

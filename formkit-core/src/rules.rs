//! Built-in rule evaluation for a single field.
//!
//! Constraints are checked in a fixed order and the first failing one wins,
//! so a field produces at most one error per pass:
//!
//! ```text
//! required -> min -> max -> minLength -> maxLength -> pattern -> oneOf
//! ```

use crate::schema::{FieldSchema, Schema};
use crate::validator::FormError;
use crate::value::{format_number, FieldValue};

/// Message for numeric rules applied to a non-numeric value.
pub const NOT_A_NUMBER: &str = "Value must be a number";

/// Default message for pattern rules.
pub const INVALID_FORMAT: &str = "Invalid format value";

/// Evaluate the rules registered for `name` in `schema` against `value`.
///
/// Fields without a schema entry never fail.
#[must_use]
pub fn evaluate_field(name: &str, value: &FieldValue, schema: &Schema) -> Option<FormError> {
    schema
        .get(name)
        .and_then(|rules| evaluate_rules(name, value, rules))
}

/// Evaluate one rule set against `value`.
#[must_use]
pub fn evaluate_rules(name: &str, value: &FieldValue, rules: &FieldSchema) -> Option<FormError> {
    check_required(name, value, rules)
        .or_else(|| check_min(value, rules))
        .or_else(|| check_max(value, rules))
        .or_else(|| check_min_length(value, rules))
        .or_else(|| check_max_length(value, rules))
        .or_else(|| check_pattern(value, rules))
        .or_else(|| check_one_of(value, rules))
        .map(FormError::new)
}

fn check_required(name: &str, value: &FieldValue, rules: &FieldSchema) -> Option<String> {
    let required = rules.required.as_ref()?;
    if value.is_truthy() {
        return None;
    }
    Some(
        required
            .message
            .clone()
            .unwrap_or_else(|| format!("{name} is required")),
    )
}

fn check_min(value: &FieldValue, rules: &FieldSchema) -> Option<String> {
    let rule = rules.min.as_ref()?;
    let Some(n) = value.to_number() else {
        return Some(NOT_A_NUMBER.to_string());
    };
    (n < rule.value)
        .then(|| rule.message_or_else(|min| format!("Must be at least {}", format_number(*min))))
}

fn check_max(value: &FieldValue, rules: &FieldSchema) -> Option<String> {
    let rule = rules.max.as_ref()?;
    let Some(n) = value.to_number() else {
        return Some(NOT_A_NUMBER.to_string());
    };
    (n > rule.value)
        .then(|| rule.message_or_else(|max| format!("Must be at most {}", format_number(*max))))
}

fn check_min_length(value: &FieldValue, rules: &FieldSchema) -> Option<String> {
    let rule = rules.min_length.as_ref()?;
    let len = value.length()?;
    (len < rule.value).then(|| rule.message_or_else(|min| format!("Must be at least {min}")))
}

fn check_max_length(value: &FieldValue, rules: &FieldSchema) -> Option<String> {
    let rule = rules.max_length.as_ref()?;
    let len = value.length()?;
    (len > rule.value).then(|| rule.message_or_else(|max| format!("Must be at most {max}")))
}

fn check_pattern(value: &FieldValue, rules: &FieldSchema) -> Option<String> {
    let rule = rules.pattern.as_ref()?;
    let text = value.to_form_string();
    (!rule.value.is_match(&text)).then(|| rule.message_or_else(|_| INVALID_FORMAT.to_string()))
}

fn check_one_of(value: &FieldValue, rules: &FieldSchema) -> Option<String> {
    let rule = rules.one_of.as_ref()?;
    (!rule.value.contains(value)).then(|| {
        rule.message_or_else(|allowed| {
            let listed: Vec<String> = allowed.iter().map(FieldValue::to_form_string).collect();
            format!("Must be one of: {}", listed.join(", "))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Pattern;
    use crate::value::Blob;
    use serde_json::json;

    fn schema_with(name: &str, rules: FieldSchema) -> Schema {
        let mut schema = Schema::new();
        schema.insert(name.to_string(), rules);
        schema
    }

    fn message(name: &str, value: impl Into<FieldValue>, rules: FieldSchema) -> Option<String> {
        evaluate_field(name, &value.into(), &schema_with(name, rules)).map(|e| e.message)
    }

    #[test]
    fn test_field_without_schema_never_fails() {
        let schema = schema_with("other", FieldSchema::new().required());
        assert!(evaluate_field("name", &FieldValue::Null, &schema).is_none());
    }

    #[test]
    fn test_required_default_and_custom_message() {
        assert_eq!(
            message("username", "", FieldSchema::new().required()),
            Some("username is required".to_string())
        );
        assert_eq!(
            message("username", "", FieldSchema::new().required_with("Pick one")),
            Some("Pick one".to_string())
        );
        assert_eq!(message("username", "bob", FieldSchema::new().required()), None);
    }

    #[test]
    fn test_required_is_permissive_falsy() {
        let rules = FieldSchema::new().required();
        for falsy in [
            FieldValue::from(""),
            FieldValue::from(0),
            FieldValue::Null,
            FieldValue::from(false),
        ] {
            assert!(message("f", falsy, rules.clone()).is_some());
        }
    }

    #[test]
    fn test_min_max_inclusive() {
        let rules = FieldSchema::new().min(18.0).max(65.0);
        assert_eq!(message("age", 18, rules.clone()), None);
        assert_eq!(message("age", 65, rules.clone()), None);
        assert_eq!(message("age", "40", rules.clone()), None);
        assert_eq!(
            message("age", 17, rules.clone()),
            Some("Must be at least 18".to_string())
        );
        assert_eq!(
            message("age", 65.5, rules),
            Some("Must be at most 65".to_string())
        );
    }

    #[test]
    fn test_min_non_numeric() {
        assert_eq!(
            message("age", "twelve", FieldSchema::new().min(1.0)),
            Some(NOT_A_NUMBER.to_string())
        );
        assert_eq!(
            message("age", "twelve", FieldSchema::new().max(1.0)),
            Some(NOT_A_NUMBER.to_string())
        );
    }

    #[test]
    fn test_min_custom_message() {
        assert_eq!(
            message("age", 3, FieldSchema::new().min_with(18.0, "Adults only")),
            Some("Adults only".to_string())
        );
    }

    #[test]
    fn test_length_rules_per_kind() {
        let rules = FieldSchema::new().min_length(2).max_length(4);

        assert!(message("f", "a", rules.clone()).is_some());
        assert!(message("f", "abc", rules.clone()).is_none());
        assert!(message("f", "abcde", rules.clone()).is_some());

        assert!(message("f", 7, rules.clone()).is_some());
        assert!(message("f", 123, rules.clone()).is_none());

        assert!(message("f", vec![1], rules.clone()).is_some());
        assert!(message("f", vec![1, 2, 3, 4, 5], rules.clone()).is_some());

        let blob = Blob::new("x.bin", "application/octet-stream", vec![0u8; 3]);
        assert!(message("f", blob, rules.clone()).is_none());

        assert!(message("f", json!({"a": 1}), rules.clone()).is_some());

        // Kinds without a length are not length-checked
        assert!(message("f", true, rules).is_none());
    }

    #[test]
    fn test_pattern() {
        let pattern = Pattern::parse("^[a-z]+$").expect("valid pattern");
        let rules = FieldSchema::new().pattern(pattern.clone());
        assert_eq!(message("slug", "hello", rules.clone()), None);
        assert_eq!(
            message("slug", "Hello!", rules),
            Some(INVALID_FORMAT.to_string())
        );

        let rules = FieldSchema::new().pattern_with(pattern, "Lowercase only");
        assert_eq!(
            message("slug", FieldValue::Null, rules),
            Some("Lowercase only".to_string())
        );
    }

    #[test]
    fn test_one_of() {
        let rules = FieldSchema::new().one_of(["free", "pro"]);
        assert_eq!(message("plan", "pro", rules.clone()), None);
        assert_eq!(
            message("plan", "gold", rules),
            Some("Must be one of: free, pro".to_string())
        );

        let rules = FieldSchema::new().one_of_with([1, 2], "Pick 1 or 2");
        // No cross-type equality: "1" is not 1
        assert_eq!(message("n", "1", rules.clone()), Some("Pick 1 or 2".to_string()));
        assert_eq!(message("n", 2, rules), None);
    }

    #[test]
    fn test_first_failing_constraint_wins() {
        let rules = FieldSchema::new()
            .required_with("req")
            .min_length_with(5, "short")
            .pattern_with(Pattern::parse("^x").expect("valid"), "pattern");

        assert_eq!(message("f", "", rules.clone()), Some("req".to_string()));
        assert_eq!(message("f", "abc", rules.clone()), Some("short".to_string()));
        assert_eq!(message("f", "abcdef", rules), Some("pattern".to_string()));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_numeric_bounds_are_inclusive(
                bound in -1_000_000i32..1_000_000,
                offset in 1i32..1000,
            ) {
                let bound = f64::from(bound);
                let rules = FieldSchema::new().min(bound).max(bound + 2000.0);

                prop_assert!(message("n", bound, rules.clone()).is_none());
                prop_assert!(message("n", bound + 2000.0, rules.clone()).is_none());
                prop_assert!(message("n", bound - f64::from(offset), rules.clone()).is_some());
                prop_assert!(message("n", bound + 2000.0 + f64::from(offset), rules).is_some());
            }

            #[test]
            fn prop_required_matches_truthiness(s in ".{0,16}") {
                let rules = FieldSchema::new().required();
                prop_assert_eq!(message("s", s.as_str(), rules).is_some(), s.is_empty());
            }
        }
    }
}

//! Input validation for untrusted request data.

use thiserror::Error;

/// Maximum length for form IDs.
pub const MAX_FORM_ID_LEN: usize = 64;
/// Maximum accepted submission body size.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Validation error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Form ID exceeds maximum length.
    #[error("form_id too long (max {MAX_FORM_ID_LEN} chars)")]
    FormIdTooLong,
    /// Form ID is empty or contains invalid characters.
    #[error("form_id contains invalid characters")]
    FormIdInvalidChars,
}

fn is_valid_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Validate a form ID.
///
/// Valid form IDs:
/// - 1-64 characters
/// - Alphanumeric, hyphen, underscore only
///
/// # Errors
///
/// Returns [`ValidationError::FormIdTooLong`] if the ID exceeds 64 characters.
/// Returns [`ValidationError::FormIdInvalidChars`] if the ID is empty or
/// contains invalid characters.
pub fn validate_form_id(id: &str) -> Result<(), ValidationError> {
    if id.chars().count() > MAX_FORM_ID_LEN {
        return Err(ValidationError::FormIdTooLong);
    }
    if id.is_empty() || !id.chars().all(is_valid_id_char) {
        return Err(ValidationError::FormIdInvalidChars);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_form_ids() {
        assert!(validate_form_id("signup").is_ok());
        assert!(validate_form_id("contact-us_v2").is_ok());
        assert!(validate_form_id(&"a".repeat(MAX_FORM_ID_LEN)).is_ok());
    }

    #[test]
    fn test_invalid_form_ids() {
        assert_eq!(validate_form_id(""), Err(ValidationError::FormIdInvalidChars));
        assert_eq!(
            validate_form_id("../etc/passwd"),
            Err(ValidationError::FormIdInvalidChars)
        );
        assert_eq!(
            validate_form_id("with space"),
            Err(ValidationError::FormIdInvalidChars)
        );
        assert_eq!(
            validate_form_id(&"a".repeat(MAX_FORM_ID_LEN + 1)),
            Err(ValidationError::FormIdTooLong)
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_ascii_ids_accepted(id in "[a-zA-Z0-9_-]{1,64}") {
                prop_assert!(validate_form_id(&id).is_ok());
            }

            #[test]
            fn prop_slash_always_rejected(prefix in "[a-z]{0,10}", suffix in "[a-z]{0,10}") {
                let id = format!("{prefix}/{suffix}");
                prop_assert!(validate_form_id(&id).is_err());
            }
        }
    }
}

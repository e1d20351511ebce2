//! External resolvers.
//!
//! A resolver replaces the built-in rules with another validation source. Two
//! adapters are provided on top of the [`Validator`] capability:
//!
//! - [`FnResolver`] wraps an async closure returning a [`ValidationResult`].
//! - [`IssueResolver`] wraps any [`IssueSource`], the shape shared by schema
//!   libraries that report a list of path-addressed issues. Issue paths are
//!   joined into error keys with dots (`address.lines.0`) or brackets
//!   (`address[lines][0]`).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use crate::error::{FormkitError, FormkitResult};
use crate::validator::{FormError, ValidationResult, Validator};
use crate::value::{FieldValue, Values};

type ResolveFn =
    dyn Fn(Values, Option<String>) -> BoxFuture<'static, FormkitResult<ValidationResult>>
        + Send
        + Sync;

/// A resolver backed by an async closure.
///
/// The closure receives a snapshot of the values and the target field name
/// for field-scoped passes.
#[derive(Clone)]
pub struct FnResolver {
    resolve: Arc<ResolveFn>,
}

impl FnResolver {
    /// Wrap an async closure.
    pub fn new<F, Fut>(resolve: F) -> Self
    where
        F: Fn(Values, Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FormkitResult<ValidationResult>> + Send + 'static,
    {
        Self {
            resolve: Arc::new(move |values, name| resolve(values, name).boxed()),
        }
    }
}

impl fmt::Debug for FnResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl Validator for FnResolver {
    async fn validate(
        &self,
        values: &Values,
        name: Option<&str>,
    ) -> FormkitResult<ValidationResult> {
        (self.resolve)(values.clone(), name.map(str::to_string)).await
    }
}

/// One step of an issue path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Sequence index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A single failure reported by a schema library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Location of the failing value, relative to what was checked.
    pub path: Vec<PathSegment>,
    /// Message for the failure.
    pub message: String,
}

impl Issue {
    /// Create an issue at `path`.
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

/// How a schema library reports that checking did not pass.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// The data failed validation.
    Invalid(Vec<Issue>),
    /// The library itself failed (misconfiguration, internal error).
    Failed(String),
}

/// A schema library that reports path-addressed issues.
pub trait IssueSource: Send + Sync {
    /// Check the whole value set.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Invalid`] with every issue found, or
    /// [`SourceError::Failed`] if checking could not run.
    fn check(&self, values: &Values) -> Result<(), SourceError>;

    /// Check a single field. Issue paths are relative to the field.
    ///
    /// The default runs [`check`](Self::check) and keeps the issues under
    /// `name`.
    ///
    /// # Errors
    ///
    /// Same as [`check`](Self::check).
    fn check_field(&self, name: &str, value: &FieldValue) -> Result<(), SourceError> {
        let mut values = Values::new();
        values.insert(name.to_string(), value.clone());
        match self.check(&values) {
            Err(SourceError::Invalid(issues)) => {
                let scoped: Vec<Issue> = issues
                    .into_iter()
                    .filter_map(|issue| match issue.path.split_first() {
                        Some((PathSegment::Key(key), rest)) if key == name => {
                            Some(Issue::new(rest.to_vec(), issue.message))
                        }
                        _ => None,
                    })
                    .collect();
                if scoped.is_empty() {
                    Ok(())
                } else {
                    Err(SourceError::Invalid(scoped))
                }
            }
            other => other,
        }
    }
}

/// How issue paths are joined into error keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStyle {
    /// `address.lines.0`
    #[default]
    Dot,
    /// `address[lines][0]`, matching the transport payload keys.
    Bracket,
}

impl PathStyle {
    /// Join path segments into a key.
    #[must_use]
    pub fn join(self, path: &[PathSegment]) -> String {
        let Some((first, rest)) = path.split_first() else {
            return String::new();
        };
        let mut key = first.to_string();
        for segment in rest {
            match self {
                Self::Dot => {
                    key.push('.');
                    key.push_str(&segment.to_string());
                }
                Self::Bracket => {
                    key.push('[');
                    key.push_str(&segment.to_string());
                    key.push(']');
                }
            }
        }
        key
    }
}

/// Adapter normalizing an [`IssueSource`] into [`ValidationResult`]s.
#[derive(Debug, Clone)]
pub struct IssueResolver<S> {
    source: S,
    style: PathStyle,
}

impl<S: IssueSource> IssueResolver<S> {
    /// Wrap a source using dot-joined keys.
    pub fn new(source: S) -> Self {
        Self {
            source,
            style: PathStyle::Dot,
        }
    }

    /// Use the given path style for error keys.
    #[must_use]
    pub fn with_path_style(mut self, style: PathStyle) -> Self {
        self.style = style;
        self
    }

    fn collect(&self, issues: Vec<Issue>, field: Option<&str>) -> ValidationResult {
        let mut result = ValidationResult::valid();
        for issue in issues {
            let mut path = Vec::with_capacity(issue.path.len() + 1);
            if let Some(field) = field {
                path.push(PathSegment::from(field));
            }
            path.extend(issue.path);
            let key = self.style.join(&path);
            // First issue per key wins
            if !result.errors.contains_key(&key) {
                result.add_error(key, FormError::new(issue.message));
            }
        }
        result
    }
}

#[async_trait]
impl<S: IssueSource> Validator for IssueResolver<S> {
    async fn validate(
        &self,
        values: &Values,
        name: Option<&str>,
    ) -> FormkitResult<ValidationResult> {
        let checked = match name {
            Some(field) => {
                let value = values.get(field).cloned().unwrap_or_default();
                self.source.check_field(field, &value)
            }
            None => self.source.check(values),
        };

        match checked {
            Ok(()) => Ok(ValidationResult::valid()),
            Err(SourceError::Invalid(issues)) => Ok(self.collect(issues, name)),
            Err(SourceError::Failed(reason)) => {
                tracing::warn!(%reason, "Resolver source failed");
                Err(FormkitError::Resolver(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::values_from_json;
    use serde_json::json;

    /// Requires `email` to contain '@' and every `tags[i]` to be non-empty.
    struct ProfileSource;

    impl IssueSource for ProfileSource {
        fn check(&self, values: &Values) -> Result<(), SourceError> {
            if values.contains_key("explode") {
                return Err(SourceError::Failed("schema not compiled".to_string()));
            }

            let mut issues = Vec::new();
            let email = values.get("email").map(FieldValue::to_form_string);
            if !email.is_some_and(|e| e.contains('@')) {
                issues.push(Issue::new(vec!["email".into()], "Invalid email"));
            }
            if let Some(FieldValue::Array(tags)) = values.get("tags") {
                for (i, tag) in tags.iter().enumerate() {
                    if !tag.is_truthy() {
                        issues.push(Issue::new(vec!["tags".into(), i.into()], "Empty tag"));
                    }
                }
            }

            if issues.is_empty() {
                Ok(())
            } else {
                Err(SourceError::Invalid(issues))
            }
        }
    }

    #[test]
    fn test_path_styles() {
        let path = vec![PathSegment::from("a"), "b".into(), 0.into()];
        assert_eq!(PathStyle::Dot.join(&path), "a.b.0");
        assert_eq!(PathStyle::Bracket.join(&path), "a[b][0]");
        assert_eq!(PathStyle::Dot.join(&[]), "");
    }

    #[tokio::test]
    async fn test_issue_resolver_whole_form() {
        let resolver = IssueResolver::new(ProfileSource);
        let values = values_from_json(json!({"email": "nope", "tags": ["a", ""]}));

        let result = resolver.validate(&values, None).await.expect("validate");
        assert!(!result.is_valid);
        assert_eq!(result.errors["email"].message, "Invalid email");
        assert_eq!(result.errors["tags.1"].message, "Empty tag");
    }

    #[tokio::test]
    async fn test_issue_resolver_bracket_keys() {
        let resolver = IssueResolver::new(ProfileSource).with_path_style(PathStyle::Bracket);
        let values = values_from_json(json!({"email": "a@b", "tags": [""]}));

        let result = resolver.validate(&values, None).await.expect("validate");
        assert_eq!(result.errors.keys().collect::<Vec<_>>(), vec!["tags[0]"]);
    }

    #[tokio::test]
    async fn test_issue_resolver_field_scope() {
        let resolver = IssueResolver::new(ProfileSource);
        let values = values_from_json(json!({"email": "a@b", "tags": [""]}));

        let result = resolver
            .validate(&values, Some("email"))
            .await
            .expect("validate");
        assert!(result.is_valid);

        let result = resolver
            .validate(&values, Some("tags"))
            .await
            .expect("validate");
        assert!(!result.is_valid);
        assert!(result.errors.contains_key("tags.0"));
    }

    #[tokio::test]
    async fn test_issue_resolver_library_failure_propagates() {
        let resolver = IssueResolver::new(ProfileSource);
        let values = values_from_json(json!({"explode": true}));

        let err = resolver
            .validate(&values, None)
            .await
            .expect_err("should fail");
        assert!(matches!(err, FormkitError::Resolver(_)));
    }

    #[tokio::test]
    async fn test_fn_resolver_receives_field_name() {
        let resolver = FnResolver::new(|values: Values, name: Option<String>| async move {
            let mut result = ValidationResult::valid();
            if let Some(name) = name {
                if values.get(&name).is_none() {
                    result.add_error(name, FormError::new("missing"));
                }
            }
            Ok(result)
        });

        let result = resolver
            .validate(&Values::new(), Some("nickname"))
            .await
            .expect("validate");
        assert_eq!(result.errors["nickname"].message, "missing");
    }
}

//! Error types for stratum-template.

use serde_json::Value;

use crate::schema::ParameterType;

/// Result type alias using [`TemplateError`].
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Errors raised while loading sources or resolving parameters.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The source could not be retrieved (network error, missing file, non-2xx).
    #[error("source unavailable: {location}: {reason}")]
    SourceUnavailable {
        /// Location that was requested.
        location: String,
        /// Why retrieval failed.
        reason: String,
    },

    /// The source was retrieved but is not a well-formed document.
    #[error("malformed source: {location}: {reason}")]
    MalformedSource {
        /// Location that was requested.
        location: String,
        /// What is wrong with the content.
        reason: String,
    },

    /// An override is outside the parameter's declared allowed values.
    #[error("value {value} is not allowed for parameter `{name}` (allowed: {})", render_values(.allowed))]
    DisallowedValue {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: Value,
        /// Declared allowed values.
        allowed: Vec<Value>,
    },

    /// An override cannot be interpreted as the parameter's declared type.
    #[error("value {value} for parameter `{name}` is not a valid {expected}")]
    TypeMismatch {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: ParameterType,
        /// Rejected value.
        value: Value,
    },

    /// A caller-supplied location is not an HTTP(S) URL.
    #[error("source location `{location}` must be an http:// or https:// URL")]
    UnsupportedLocation {
        /// Location as supplied.
        location: String,
    },

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TemplateError {
    /// Create a source-unavailable error.
    #[must_use]
    pub fn unavailable(location: impl ToString, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a malformed-source error.
    #[must_use]
    pub fn malformed(location: impl ToString, reason: impl ToString) -> Self {
        Self::MalformedSource {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for errors caused by caller-supplied values.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DisallowedValue { .. } | Self::TypeMismatch { .. } | Self::UnsupportedLocation { .. }
        )
    }
}

fn render_values(values: &[Value]) -> String {
    let rendered: Vec<String> = values.iter().map(Value::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disallowed_value_lists_allowed() {
        let err = TemplateError::DisallowedValue {
            name: "env".to_owned(),
            value: json!("staging"),
            allowed: vec![json!("dev"), json!("prod")],
        };
        assert_eq!(
            err.to_string(),
            r#"value "staging" is not allowed for parameter `env` (allowed: ["dev", "prod"])"#
        );
        assert!(err.is_validation());
    }

    #[test]
    fn unsupported_location_is_validation() {
        let err = TemplateError::UnsupportedLocation {
            location: "/etc/hostname".to_owned(),
        };
        assert!(err.is_validation());
    }

    #[test]
    fn source_errors_are_not_validation() {
        assert!(!TemplateError::unavailable("t.json", "gone").is_validation());
        assert!(!TemplateError::malformed("t.json", "bad").is_validation());
    }
}

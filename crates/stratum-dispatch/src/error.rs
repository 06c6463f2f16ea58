//! Error types for stratum-dispatch.

/// Result type alias using [`DispatchError`].
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors raised before a request reaches a backend.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A required deployment identifier is empty.
    #[error("missing required field: {field}")]
    MissingRequiredField {
        /// Name of the empty field as the caller submits it.
        field: &'static str,
    },

    /// Backend settings are unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DispatchError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

//! Uniform outcome of a dispatch attempt.

use serde_json::Value;

/// Outcome of one dispatch attempt, whichever backend handled it.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// The backend accepted the deployment.
    Success(DispatchSuccess),
    /// The backend refused the deployment or could not be reached.
    Failure(DispatchFailure),
}

impl DispatchResult {
    /// Success with the backend's response body.
    #[must_use]
    pub fn success(message: impl Into<String>, backend_response: Option<Value>) -> Self {
        Self::Success(DispatchSuccess {
            message: message.into(),
            backend_response,
        })
    }

    /// Success of a fire-and-forget trigger.
    #[must_use]
    pub fn dispatched() -> Self {
        Self::success("dispatched", None)
    }

    /// Returns true if the backend accepted the deployment.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<DispatchFailure> for DispatchResult {
    fn from(failure: DispatchFailure) -> Self {
        Self::Failure(failure)
    }
}

/// Accepted deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSuccess {
    /// Short human-readable summary.
    pub message: String,
    /// Backend response body, when the backend returns one.
    pub backend_response: Option<Value>,
}

/// Classification of a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credential rejected, expired or lacking permission.
    Unauthorized,
    /// Backend unreachable or answered with an unclassified error.
    BackendUnavailable,
    /// Backend did not answer in time.
    Timeout,
    /// Request could not be prepared or the response could not be read.
    Internal,
}

impl FailureKind {
    /// Stable machine-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

/// Refused or failed deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Upstream HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Summary of what failed.
    pub message: String,
    /// Operator guidance for resolving the failure.
    pub guidance: Option<String>,
    /// Raw upstream body, kept for diagnostics.
    pub raw_body: Option<String>,
}

impl DispatchFailure {
    /// Credential failure with remediation guidance.
    #[must_use]
    pub fn unauthorized(
        status: u16,
        message: impl Into<String>,
        guidance: impl Into<String>,
        raw_body: String,
    ) -> Self {
        Self {
            kind: FailureKind::Unauthorized,
            status: Some(status),
            message: message.into(),
            guidance: Some(guidance.into()),
            raw_body: Some(raw_body),
        }
    }

    /// Unclassified non-success response.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>, raw_body: String) -> Self {
        Self {
            kind: FailureKind::BackendUnavailable,
            status: Some(status),
            message: message.into(),
            guidance: None,
            raw_body: Some(raw_body),
        }
    }

    /// Failure preparing the request or reading the response.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Internal,
            status: None,
            message: message.into(),
            guidance: None,
            raw_body: None,
        }
    }

    /// Classify a transport-level error from the HTTP client.
    #[must_use]
    pub fn transport(context: &str, error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FailureKind::Timeout
        } else if error.is_builder() {
            FailureKind::Internal
        } else {
            FailureKind::BackendUnavailable
        };

        let status = error.status().map(|s| s.as_u16());

        Self {
            kind,
            status,
            message: format!("{context}: {}", error.without_url()),
            guidance: None,
            raw_body: None,
        }
    }
}

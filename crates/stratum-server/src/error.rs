//! Server error types.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use stratum_dispatch::DispatchError;
use stratum_template::TemplateError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::ConfigError;

/// Errors raised by a request before it reaches the backend.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl ApiError {
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Template(TemplateError::SourceUnavailable { .. }) => "source_unavailable",
            Self::Template(TemplateError::MalformedSource { .. }) => "malformed_source",
            Self::Template(TemplateError::DisallowedValue { .. }) => "disallowed_value",
            Self::Template(TemplateError::TypeMismatch { .. }) => "type_mismatch",
            Self::Template(TemplateError::UnsupportedLocation { .. }) => "unsupported_location",
            Self::Dispatch(DispatchError::MissingRequiredField { .. }) => "missing_required_field",
            Self::InvalidBody(_) => "invalid_body",
            Self::Template(TemplateError::Http(_))
            | Self::Dispatch(DispatchError::Config(_) | DispatchError::Http(_)) => "internal",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Template(
                TemplateError::DisallowedValue { .. }
                | TemplateError::TypeMismatch { .. }
                | TemplateError::UnsupportedLocation { .. },
            )
            | Self::Dispatch(DispatchError::MissingRequiredField { .. })
            | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::Template(TemplateError::SourceUnavailable { .. }) => StatusCode::BAD_GATEWAY,
            Self::Template(TemplateError::MalformedSource { .. } | TemplateError::Http(_))
            | Self::Dispatch(DispatchError::Config(_) | DispatchError::Http(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Structured description of a validation failure.
    fn details(&self) -> Option<Value> {
        match self {
            Self::Template(TemplateError::DisallowedValue {
                name,
                value,
                allowed,
            }) => Some(json!({ "name": name, "value": value, "allowed": allowed })),
            Self::Template(TemplateError::TypeMismatch { name, expected, .. }) => {
                Some(json!({ "name": name, "expected": expected.as_str() }))
            }
            Self::Template(TemplateError::UnsupportedLocation { location }) => {
                Some(json!({ "location": location }))
            }
            Self::Dispatch(DispatchError::MissingRequiredField { field }) => Some(json!({ "field": field })),
            _ => None,
        }
    }

    /// Returns true if the caller's input caused the error.
    fn is_client_error(&self) -> bool {
        match self {
            Self::Template(e) => e.is_validation(),
            Self::Dispatch(DispatchError::MissingRequiredField { .. }) | Self::InvalidBody(_) => true,
            Self::Dispatch(_) => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if self.error_type() == "internal" {
            error!(error = %self, "request failed");
            "internal server error".to_owned()
        } else {
            if self.is_client_error() {
                debug!(error = %self, kind = self.error_type(), "request rejected");
            } else {
                warn!(error = %self, kind = self.error_type(), "request failed");
            }
            self.to_string()
        };

        let mut body = json!({ "ok": false, "error": message, "kind": self.error_type() });
        if let Some(details) = self.details() {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

/// Errors that stop the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build source loader: {0}")]
    Loader(#[from] TemplateError),

    #[error("failed to build backend: {0}")]
    Backend(#[from] DispatchError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stratum_template::ParameterType;

    #[rstest]
    #[case(ApiError::Template(TemplateError::unavailable("t.json", "HTTP 404")), StatusCode::BAD_GATEWAY)]
    #[case(ApiError::Template(TemplateError::malformed("t.json", "not JSON")), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(
        ApiError::Template(TemplateError::DisallowedValue {
            name: "vmSize".into(),
            value: Value::from("Huge"),
            allowed: vec![Value::from("Standard_B1s")],
        }),
        StatusCode::BAD_REQUEST
    )]
    #[case(
        ApiError::Template(TemplateError::TypeMismatch {
            name: "count".into(),
            expected: ParameterType::Int,
            value: Value::from("many"),
        }),
        StatusCode::BAD_REQUEST
    )]
    #[case(
        ApiError::Dispatch(DispatchError::MissingRequiredField { field: "resourceGroup" }),
        StatusCode::BAD_REQUEST
    )]
    #[case(
        ApiError::Template(TemplateError::UnsupportedLocation { location: "/etc/hostname".into() }),
        StatusCode::BAD_REQUEST
    )]
    #[case(ApiError::InvalidBody("expected value".into()), StatusCode::BAD_REQUEST)]
    #[case(ApiError::Dispatch(DispatchError::config("bad url")), StatusCode::INTERNAL_SERVER_ERROR)]
    fn error_status_codes(#[case] error: ApiError, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
    }

    #[test]
    fn error_types() {
        assert_eq!(
            ApiError::Dispatch(DispatchError::MissingRequiredField { field: "location" }).error_type(),
            "missing_required_field"
        );
        assert_eq!(
            ApiError::Dispatch(DispatchError::config("x")).error_type(),
            "internal"
        );
    }

    #[allow(clippy::unwrap_used)]
    async fn body_of(error: ApiError) -> Value {
        let bytes = axum::body::to_bytes(error.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_carry_details() {
        let body = body_of(ApiError::Template(TemplateError::TypeMismatch {
            name: "count".into(),
            expected: ParameterType::Int,
            value: Value::from("many"),
        }))
        .await;
        assert_eq!(body["kind"], "type_mismatch");
        assert_eq!(body["details"], json!({ "name": "count", "expected": "int" }));

        let body = body_of(ApiError::Dispatch(DispatchError::MissingRequiredField {
            field: "location",
        }))
        .await;
        assert_eq!(body["details"], json!({ "field": "location" }));

        let body = body_of(ApiError::Template(TemplateError::unavailable("t.json", "HTTP 404"))).await;
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn internal_details_are_hidden() {
        let response = ApiError::Dispatch(DispatchError::config("secret path /etc/x")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal server error");
        assert_eq!(body["ok"], false);
    }
}

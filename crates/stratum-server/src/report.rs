//! Translating dispatch outcomes into HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use stratum_dispatch::{DispatchFailure, DispatchResult, FailureKind};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody {
    ok: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment_result: Option<Value>,
}

#[derive(Debug, Serialize)]
struct FailureBody {
    ok: bool,
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

/// HTTP status a failure is reported with.
#[must_use]
pub const fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::Unauthorized => StatusCode::UNAUTHORIZED,
        FailureKind::BackendUnavailable => StatusCode::BAD_GATEWAY,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the caller-facing response for a dispatch outcome.
///
/// Credential failures return guidance instead of the upstream body, which
/// is logged only.
#[must_use]
pub fn report(result: DispatchResult) -> Response {
    match result {
        DispatchResult::Success(success) => {
            info!(message = %success.message, "dispatch succeeded");
            let body = SuccessBody {
                ok: true,
                message: success.message,
                deployment_result: success.backend_response,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        DispatchResult::Failure(failure) => failure_response(failure),
    }
}

fn failure_response(failure: DispatchFailure) -> Response {
    let status = status_for(failure.kind);

    warn!(
        kind = failure.kind.as_str(),
        upstream_status = failure.status,
        error = %failure.message,
        "dispatch failed"
    );

    let details = match failure.kind {
        FailureKind::Unauthorized => failure.guidance.map(Value::String),
        FailureKind::BackendUnavailable => failure.raw_body.as_deref().and_then(raw_details),
        FailureKind::Timeout | FailureKind::Internal => None,
    };

    let body = FailureBody {
        ok: false,
        error: failure.message,
        kind: failure.kind.as_str(),
        details,
        status: failure.status,
    };
    (status, Json(body)).into_response()
}

/// Upstream body as JSON when it parses, otherwise as text.
fn raw_details(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned())))
}

//! Deployment backends.
//!
//! Two implementations sit behind [`DeploymentBackend`]:
//!
//! - [`DirectBackend`] submits an incremental deployment to the cloud
//!   resource manager using service-principal credentials.
//! - [`IndirectBackend`] triggers a CI workflow with the final parameters as
//!   inputs and returns as soon as the trigger is accepted.
//!
//! The active backend is chosen once at startup by [`create_backend`].

mod direct;
mod indirect;

pub use direct::DirectBackend;
pub use indirect::IndirectBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::warn;

use crate::config::BackendConfig;
use crate::error::{DispatchError, Result};
use crate::request::DeploymentRequest;
use crate::result::{DispatchFailure, DispatchResult};

/// A destination deployments can be dispatched to.
#[async_trait]
pub trait DeploymentBackend: Send + Sync + std::fmt::Debug {
    /// Short name for logs and health output.
    fn name(&self) -> &'static str;

    /// Make a single dispatch attempt.
    async fn dispatch(&self, request: &DeploymentRequest) -> DispatchResult;
}

/// Create the configured backend.
pub fn create_backend(
    config: &BackendConfig,
    timeout: Duration,
) -> Result<Arc<dyn DeploymentBackend>> {
    match config {
        BackendConfig::Direct(direct) => Ok(Arc::new(DirectBackend::new(direct.clone(), timeout)?)),
        BackendConfig::Indirect(indirect) => {
            Ok(Arc::new(IndirectBackend::new(indirect.clone(), timeout)?))
        }
    }
}

/// Parse a configured base URL.
fn parse_base_url(setting: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| DispatchError::config(format!("{setting}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(DispatchError::config(format!("{setting}: not a base URL: {raw}")));
    }
    Ok(url)
}

/// Append percent-encoded path segments to a base URL.
fn join_segments(base: &Url, segments: &[&str]) -> std::result::Result<Url, DispatchFailure> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| DispatchFailure::internal(format!("not a base URL: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Read a response body, turning non-success statuses into failures.
///
/// Statuses listed in `unauthorized` are reported as credential failures
/// carrying `guidance`; anything else non-2xx is an unclassified rejection.
async fn read_success(
    response: reqwest::Response,
    context: &str,
    unauthorized: &[StatusCode],
    guidance: &str,
) -> std::result::Result<String, DispatchFailure> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| DispatchFailure::transport(context, e))?;

    if status.is_success() {
        return Ok(body);
    }

    if unauthorized.contains(&status) {
        warn!(status = status.as_u16(), response = %body, "{context}: credentials rejected");
        return Err(DispatchFailure::unauthorized(
            status.as_u16(),
            format!("{context}: credentials rejected"),
            guidance,
            body,
        ));
    }

    warn!(status = status.as_u16(), response = %body, "{context}: request rejected");
    Err(DispatchFailure::rejected(
        status.as_u16(),
        format!("{context}: upstream returned {status}"),
        body,
    ))
}

/// Parse an optional JSON body. Empty bodies yield `None`.
fn parse_optional_json(context: &str, body: &str) -> std::result::Result<Option<Value>, DispatchFailure> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|e| DispatchFailure::internal(format!("{context}: invalid JSON response: {e}")))
}

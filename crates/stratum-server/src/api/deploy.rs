//! Deployment dispatch endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use stratum_dispatch::DeploymentRequest;
use stratum_template::{build_metadata, merge, OverrideSet};
use tracing::info;

use super::AppState;
use crate::error::ApiError;
use crate::report::report;

/// Body of `POST /deploy`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployRequest {
    pub resource_group: String,
    pub deployment_name: String,
    pub location: String,
    /// Operator overrides, keyed by parameter name.
    pub parameters: OverrideSet,
    pub template_url: Option<String>,
    pub params_url: Option<String>,
}

/// Resolve parameters and dispatch a deployment.
pub async fn deploy(
    State(state): State<AppState>,
    body: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;

    let (template, parameters, policy) = state
        .sources
        .resolve(body.template_url.as_deref(), body.params_url.as_deref())?;

    let sources = state.loader.load(&template, parameters.as_ref(), policy).await?;
    let metadata = build_metadata(sources.template.schema(), &sources.values);
    let final_parameters = merge(&metadata, &body.parameters, &state.rules)?;

    let request = DeploymentRequest::build(
        body.resource_group,
        body.deployment_name,
        body.location,
        final_parameters,
        sources.template.into_body(),
    )?;

    info!(
        backend = state.backend.name(),
        resource_group = %request.resource_group,
        deployment = %request.deployment_name,
        location = %request.location,
        parameters = request.parameters.len(),
        "dispatching deployment"
    );

    let result = state.backend.dispatch(&request).await;
    Ok(report(result))
}

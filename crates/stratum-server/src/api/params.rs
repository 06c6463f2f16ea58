//! Parameter metadata endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use stratum_template::{build_metadata, ParameterMetadata};
use tracing::debug;

use super::AppState;
use crate::error::ApiError;

/// Optional per-request source locations.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceQuery {
    /// Template location replacing the configured one.
    pub template_url: Option<String>,
    /// Values document location replacing the configured one.
    pub params_url: Option<String>,
}

/// Response for `GET /params`.
#[derive(Debug, Serialize)]
pub struct ParamsResponse {
    pub parameters: Vec<ParameterMetadata>,
}

/// Response for `GET /api/params`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiParamsResponse {
    pub ui_params: Vec<ParameterMetadata>,
}

async fn resolve_metadata(state: &AppState, query: &SourceQuery) -> Result<Vec<ParameterMetadata>, ApiError> {
    let (template, parameters, policy) = state
        .sources
        .resolve(query.template_url.as_deref(), query.params_url.as_deref())?;

    let sources = state.loader.load(&template, parameters.as_ref(), policy).await?;
    let metadata = build_metadata(sources.template.schema(), &sources.values);

    debug!(template = %template, parameters = metadata.len(), "parameter metadata resolved");
    Ok(metadata)
}

/// List declared parameters with their effective values.
pub async fn get_params(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<ParamsResponse>, ApiError> {
    let parameters = resolve_metadata(&state, &query).await?;
    Ok(Json(ParamsResponse { parameters }))
}

/// Same metadata under the key form front-ends expect.
pub async fn get_ui_params(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<UiParamsResponse>, ApiError> {
    let ui_params = resolve_metadata(&state, &query).await?;
    Ok(Json(UiParamsResponse { ui_params }))
}

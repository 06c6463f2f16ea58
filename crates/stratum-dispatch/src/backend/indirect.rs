//! CI workflow trigger backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use super::{join_segments, parse_base_url, parse_optional_json, read_success, DeploymentBackend};
use crate::config::IndirectConfig;
use crate::error::{DispatchError, Result};
use crate::request::DeploymentRequest;
use crate::result::{DispatchFailure, DispatchResult};

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";

const TOKEN_GUIDANCE: &str = "The CI access token may be expired, revoked, or lack the \
    required permissions. Verify the token has repo and workflow scopes and regenerate it \
    if needed.";

/// Triggers a workflow run that performs the deployment.
///
/// Success means the trigger was accepted, not that the deployment finished.
#[derive(Debug)]
pub struct IndirectBackend {
    client: Client,
    config: IndirectConfig,
    token: SecretString,
    api: Url,
}

impl IndirectBackend {
    /// Create a backend for the configured workflow.
    pub fn new(config: IndirectConfig, timeout: Duration) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or(DispatchError::MissingRequiredField { field: "backend.token" })?;
        let api = parse_base_url("backend.api_url", &config.api_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stratum/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            token,
            api,
        })
    }

    /// Workflow inputs for a request.
    ///
    /// The dispatch API accepts string inputs only, so every value is
    /// rendered as a string: strings as-is, null as empty, anything else as
    /// its JSON text.
    fn workflow_inputs(&self, request: &DeploymentRequest) -> Map<String, Value> {
        let mut inputs: Map<String, Value> = request
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(input_string(value))))
            .collect();

        if self.config.include_target_inputs {
            inputs.insert("resourceGroup".to_owned(), json!(request.resource_group));
            inputs.insert("deploymentName".to_owned(), json!(request.deployment_name));
            inputs.insert("location".to_owned(), json!(request.location));
        }

        inputs
    }

    async fn trigger(&self, request: &DeploymentRequest) -> std::result::Result<DispatchResult, DispatchFailure> {
        let url = join_segments(
            &self.api,
            &[
                "repos",
                &self.config.owner,
                &self.config.repo,
                "actions",
                "workflows",
                &self.config.workflow,
                "dispatches",
            ],
        )?;

        let body = json!({
            "ref": self.config.git_ref,
            "inputs": self.workflow_inputs(request),
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .header(ACCEPT, MEDIA_TYPE)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchFailure::transport("workflow dispatch", e))?;

        let status = response.status();
        let raw = read_success(
            response,
            "workflow dispatch",
            &[StatusCode::UNAUTHORIZED],
            TOKEN_GUIDANCE,
        )
        .await?;

        info!(
            status = status.as_u16(),
            workflow = %self.config.workflow,
            git_ref = %self.config.git_ref,
            "workflow dispatched"
        );

        if status == StatusCode::NO_CONTENT {
            return Ok(DispatchResult::dispatched());
        }

        let backend_response = parse_optional_json("workflow dispatch", &raw)
            .unwrap_or_else(|_| Some(Value::String(raw)));
        Ok(DispatchResult::success("dispatched", backend_response))
    }
}

#[async_trait]
impl DeploymentBackend for IndirectBackend {
    fn name(&self) -> &'static str {
        "indirect"
    }

    #[instrument(
        skip(self, request),
        fields(
            owner = %self.config.owner,
            repo = %self.config.repo,
            resource_group = %request.resource_group,
            deployment = %request.deployment_name
        )
    )]
    async fn dispatch(&self, request: &DeploymentRequest) -> DispatchResult {
        self.trigger(request).await.unwrap_or_else(DispatchResult::from)
    }
}

fn input_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn request(parameters: Value) -> DeploymentRequest {
        let Value::Object(parameters) = parameters else {
            panic!("parameters must be an object");
        };
        DeploymentRequest::build("rg-demo", "deploy-1", "westeurope", parameters, json!({}))
            .unwrap()
    }

    fn backend(include_target_inputs: bool) -> IndirectBackend {
        let mut config = IndirectConfig::new("acme", "infra", "deploy-vm.yml", "tok");
        config.include_target_inputs = include_target_inputs;
        IndirectBackend::new(config, Duration::from_secs(5)).unwrap()
    }

    #[rstest]
    #[case(json!("Standard_B2s"), "Standard_B2s")]
    #[case(json!(null), "")]
    #[case(json!(3), "3")]
    #[case(json!(true), "true")]
    #[case(json!(["a", "b"]), r#"["a","b"]"#)]
    #[case(json!({ "tier": "basic" }), r#"{"tier":"basic"}"#)]
    fn renders_inputs_as_strings(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(input_string(&value), expected);
    }

    #[test]
    fn inputs_exclude_targets_by_default() {
        let inputs = backend(false).workflow_inputs(&request(json!({ "vmSize": "Standard_B2s" })));
        assert_eq!(Value::Object(inputs), json!({ "vmSize": "Standard_B2s" }));
    }

    #[test]
    fn inputs_can_carry_targets() {
        let inputs = backend(true).workflow_inputs(&request(json!({ "count": 2 })));
        assert_eq!(
            Value::Object(inputs),
            json!({
                "count": "2",
                "resourceGroup": "rg-demo",
                "deploymentName": "deploy-1",
                "location": "westeurope"
            })
        );
    }

    #[test]
    fn missing_token_is_rejected_at_construction() {
        let mut config = IndirectConfig::new("acme", "infra", "deploy-vm.yml", "tok");
        config.token = None;
        let err = IndirectBackend::new(config, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MissingRequiredField { field: "backend.token" }
        ));
    }
}

//! Resource manager deployment backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use super::{join_segments, parse_base_url, parse_optional_json, read_success, DeploymentBackend};
use crate::config::DirectConfig;
use crate::error::{DispatchError, Result};
use crate::request::DeploymentRequest;
use crate::result::{DispatchFailure, DispatchResult};

const CREDENTIAL_GUIDANCE: &str = "The service principal credentials were rejected. Verify \
    tenant_id, client_id and client_secret, check that the secret has not expired, and that \
    the principal holds a role allowing deployments on the subscription.";

type Outcome<T> = std::result::Result<T, DispatchFailure>;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Submits incremental deployments with service-principal credentials.
///
/// Each dispatch acquires a fresh token, creates or updates the target
/// resource group, then submits the deployment.
#[derive(Debug)]
pub struct DirectBackend {
    client: Client,
    config: DirectConfig,
    client_secret: SecretString,
    authority: Url,
    management: Url,
}

impl DirectBackend {
    /// Create a backend for the configured subscription.
    pub fn new(config: DirectConfig, timeout: Duration) -> Result<Self> {
        let client_secret = config
            .client_secret
            .clone()
            .ok_or(DispatchError::MissingRequiredField {
                field: "backend.client_secret",
            })?;
        let authority = parse_base_url("backend.authority_host", &config.authority_host)?;
        let management = parse_base_url("backend.management_endpoint", &config.management_endpoint)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            config,
            client_secret,
            authority,
            management,
        })
    }

    /// Create the resource group, or update it if it already exists.
    ///
    /// Returns the resource manager's view of the group.
    pub async fn ensure_resource_group(&self, name: &str, location: &str) -> Outcome<Value> {
        let token = self.acquire_token().await?;
        self.put_resource_group(&token, name, location).await
    }

    async fn acquire_token(&self) -> Outcome<SecretString> {
        let url = join_segments(
            &self.authority,
            &[&self.config.tenant_id, "oauth2", "v2.0", "token"],
        )?;
        let scope = format!("{}/.default", self.config.management_endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DispatchFailure::transport("token request", e))?;

        let body = read_success(
            response,
            "token request",
            &[StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED],
            CREDENTIAL_GUIDANCE,
        )
        .await?;

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| DispatchFailure::internal(format!("token request: invalid response: {e}")))?;

        debug!(tenant = %self.config.tenant_id, "access token acquired");
        Ok(SecretString::from(token.access_token))
    }

    fn resource_group_url(&self, name: &str) -> Outcome<Url> {
        let mut url = join_segments(
            &self.management,
            &["subscriptions", &self.config.subscription_id, "resourcegroups", name],
        )?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        Ok(url)
    }

    fn deployment_url(&self, request: &DeploymentRequest) -> Outcome<Url> {
        let mut url = join_segments(
            &self.management,
            &[
                "subscriptions",
                &self.config.subscription_id,
                "resourcegroups",
                &request.resource_group,
                "providers",
                "Microsoft.Resources",
                "deployments",
                &request.deployment_name,
            ],
        )?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        Ok(url)
    }

    async fn put_resource_group(&self, token: &SecretString, name: &str, location: &str) -> Outcome<Value> {
        let url = self.resource_group_url(name)?;

        let response = self
            .client
            .put(url)
            .bearer_auth(token.expose_secret())
            .json(&json!({ "location": location }))
            .send()
            .await
            .map_err(|e| DispatchFailure::transport("resource group update", e))?;

        let body = read_success(
            response,
            "resource group update",
            &[StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN],
            CREDENTIAL_GUIDANCE,
        )
        .await?;

        debug!(resource_group = %name, location = %location, "resource group ensured");
        Ok(parse_optional_json("resource group update", &body)?.unwrap_or(Value::Null))
    }

    async fn submit_deployment(&self, token: &SecretString, request: &DeploymentRequest) -> Outcome<Option<Value>> {
        let url = self.deployment_url(request)?;
        let body = json!({
            "properties": {
                "mode": "Incremental",
                "template": request.template,
                "parameters": wrap_parameters(&request.parameters),
            }
        });

        let response = self
            .client
            .put(url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchFailure::transport("deployment submission", e))?;

        let raw = read_success(
            response,
            "deployment submission",
            &[StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN],
            CREDENTIAL_GUIDANCE,
        )
        .await?;

        parse_optional_json("deployment submission", &raw)
    }

    async fn deploy(&self, request: &DeploymentRequest) -> Outcome<DispatchResult> {
        let token = self.acquire_token().await?;
        self.put_resource_group(&token, &request.resource_group, &request.location)
            .await?;
        let deployment = self.submit_deployment(&token, request).await?;

        info!(
            resource_group = %request.resource_group,
            deployment = %request.deployment_name,
            "deployment submitted"
        );
        Ok(DispatchResult::success("deployment submitted", deployment))
    }
}

#[async_trait]
impl DeploymentBackend for DirectBackend {
    fn name(&self) -> &'static str {
        "direct"
    }

    #[instrument(
        skip(self, request),
        fields(
            subscription = %self.config.subscription_id,
            resource_group = %request.resource_group,
            deployment = %request.deployment_name
        )
    )]
    async fn dispatch(&self, request: &DeploymentRequest) -> DispatchResult {
        self.deploy(request).await.unwrap_or_else(DispatchResult::from)
    }
}

/// Wrap each parameter as `{ "value": v }`.
fn wrap_parameters(parameters: &Map<String, Value>) -> Map<String, Value> {
    parameters
        .iter()
        .map(|(name, value)| (name.clone(), json!({ "value": value })))
        .collect()
}

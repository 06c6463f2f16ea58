//! Backend configuration.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Which backend deployments are dispatched to, with its settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Submit deployments straight to the resource manager.
    Direct(DirectConfig),
    /// Trigger a CI workflow that performs the deployment.
    Indirect(IndirectConfig),
}

impl BackendConfig {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Indirect(_) => "indirect",
        }
    }

    /// Names of required settings that are empty or absent.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        match self {
            Self::Direct(config) => config.missing_fields(),
            Self::Indirect(config) => config.missing_fields(),
        }
    }
}

/// Service-principal credentials and endpoints for the resource manager.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectConfig {
    /// Directory (tenant) identifier.
    #[serde(default)]
    pub tenant_id: String,

    /// Application (client) identifier.
    #[serde(default)]
    pub client_id: String,

    /// Client secret.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub client_secret: Option<SecretString>,

    /// Subscription deployments are scoped to.
    #[serde(default)]
    pub subscription_id: String,

    /// Token authority.
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    /// Resource manager endpoint.
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,

    /// Resource manager API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_owned()
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_owned()
}

fn default_api_version() -> String {
    "2021-04-01".to_owned()
}

impl DirectConfig {
    /// Create a configuration with default endpoints.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        subscription_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: Some(SecretString::from(client_secret.into())),
            subscription_id: subscription_id.into(),
            authority_host: default_authority_host(),
            management_endpoint: default_management_endpoint(),
            api_version: default_api_version(),
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tenant_id.trim().is_empty() {
            missing.push("backend.tenant_id");
        }
        if self.client_id.trim().is_empty() {
            missing.push("backend.client_id");
        }
        if secret_is_empty(self.client_secret.as_ref()) {
            missing.push("backend.client_secret");
        }
        if self.subscription_id.trim().is_empty() {
            missing.push("backend.subscription_id");
        }
        missing
    }
}

/// CI workflow coordinates and credential.
#[derive(Debug, Clone, Deserialize)]
pub struct IndirectConfig {
    /// Repository owner.
    #[serde(default)]
    pub owner: String,

    /// Repository containing the workflow.
    #[serde(default)]
    pub repo: String,

    /// Workflow file name or identifier.
    #[serde(default)]
    pub workflow: String,

    /// Branch or tag the workflow is run from.
    #[serde(default = "default_git_ref")]
    pub git_ref: String,

    /// Access token with workflow scope.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,

    /// CI API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Also pass resource group, deployment name and location as inputs.
    #[serde(default)]
    pub include_target_inputs: bool,
}

fn default_git_ref() -> String {
    "main".to_owned()
}

fn default_api_url() -> String {
    "https://api.github.com".to_owned()
}

impl IndirectConfig {
    /// Create a configuration for the given workflow with default endpoints.
    #[must_use]
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        workflow: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            workflow: workflow.into(),
            git_ref: default_git_ref(),
            token: Some(SecretString::from(token.into())),
            api_url: default_api_url(),
            include_target_inputs: false,
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.owner.trim().is_empty() {
            missing.push("backend.owner");
        }
        if self.repo.trim().is_empty() {
            missing.push("backend.repo");
        }
        if self.workflow.trim().is_empty() {
            missing.push("backend.workflow");
        }
        if self.git_ref.trim().is_empty() {
            missing.push("backend.git_ref");
        }
        if secret_is_empty(self.token.as_ref()) {
            missing.push("backend.token");
        }
        missing
    }
}

fn secret_is_empty(secret: Option<&SecretString>) -> bool {
    secret.map_or(true, |s| s.expose_secret().trim().is_empty())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(SecretString::from))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_config_from_tagged_value() {
        let config: BackendConfig = serde_json::from_value(json!({
            "kind": "direct",
            "tenant_id": "tenant",
            "client_id": "client",
            "client_secret": "s3cret",
            "subscription_id": "sub"
        }))
        .unwrap();

        assert_eq!(config.kind(), "direct");
        assert!(config.missing_fields().is_empty());
        let BackendConfig::Direct(direct) = config else {
            panic!("expected direct config");
        };
        assert_eq!(direct.management_endpoint, "https://management.azure.com");
        assert_eq!(direct.api_version, "2021-04-01");
    }

    #[test]
    fn indirect_config_defaults_ref_and_api() {
        let config: BackendConfig = serde_json::from_value(json!({
            "kind": "indirect",
            "owner": "acme",
            "repo": "infra",
            "workflow": "deploy-vm.yml",
            "token": "ghp_x"
        }))
        .unwrap();

        let BackendConfig::Indirect(indirect) = config else {
            panic!("expected indirect config");
        };
        assert_eq!(indirect.git_ref, "main");
        assert_eq!(indirect.api_url, "https://api.github.com");
        assert!(!indirect.include_target_inputs);
    }

    #[test]
    fn reports_missing_credentials() {
        let config: BackendConfig = serde_json::from_value(json!({
            "kind": "direct",
            "tenant_id": "tenant",
            "client_secret": "  "
        }))
        .unwrap();

        assert_eq!(
            config.missing_fields(),
            [
                "backend.client_id",
                "backend.client_secret",
                "backend.subscription_id"
            ]
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = IndirectConfig::new("acme", "infra", "deploy.yml", "ghp_topsecret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ghp_topsecret"));
    }
}

//! Server configuration.
//!
//! Loaded once at startup and passed explicitly to everything that needs it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use stratum_dispatch::BackendConfig;
use stratum_template::{OverrideRule, SourceLocation};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("configuration error: {0}")]
    Parse(String),

    /// Required settings are absent or empty.
    #[error("configuration missing: {}", .fields.join(", "))]
    Missing {
        /// Dotted names of the missing settings.
        fields: Vec<String>,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Outbound HTTP settings.
    #[serde(default)]
    pub http: HttpSettings,

    /// Default template sources.
    #[serde(default)]
    pub sources: SourceSettings,

    /// Deployment backend.
    #[serde(default)]
    pub backend: Option<BackendConfig>,

    /// Override rules applied before validation.
    #[serde(default)]
    pub rules: Vec<OverrideRule>,
}

impl ServerConfig {
    /// Load configuration from file and environment.
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. `stratum.toml` in the current directory (if present)
    /// 3. The given config file (if provided)
    /// 4. Environment variables prefixed `STRATUM_`, with `__` separating
    ///    nested keys (`STRATUM_BACKEND__TOKEN`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Toml::file("stratum.toml"));

        if let Some(p) = path {
            figment = figment.merge(Toml::file(p));
        }

        Self::from_figment(figment.merge(Env::prefixed("STRATUM_").split("__")))
    }

    /// Extract configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(ConfigError::from)
    }

    /// Check that everything needed to serve requests is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        if self.sources.template.as_deref().map_or(true, |t| t.trim().is_empty()) {
            missing.push("sources.template".to_owned());
        }

        match &self.backend {
            Some(backend) => missing.extend(backend.missing_fields().into_iter().map(str::to_owned)),
            None => missing.push("backend".to_owned()),
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing { fields: missing });
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.drop.trim().is_empty() || rule.when.parameter.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "rules[{index}]: drop and when.parameter must name parameters"
                )));
            }
            if !rule.when.is_well_formed() {
                return Err(ConfigError::Invalid(format!(
                    "rules[{index}]: exactly one of when.equals and when.not_equals is required"
                )));
            }
        }

        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Address the HTTP API listens on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

const fn default_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// Timeout for every outbound request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpSettings {
    /// Outbound request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Default template sources, used when a request names none.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSettings {
    /// Template location (URL or path).
    #[serde(default)]
    pub template: Option<String>,

    /// Parameter-values document location (URL or path).
    #[serde(default)]
    pub parameters: Option<String>,

    /// How long fetched documents are cached, in seconds. Zero disables it.
    #[serde(default)]
    pub cache_ttl_secs: u64,
}

impl SourceSettings {
    /// Configured template location.
    #[must_use]
    pub fn template_location(&self) -> Option<SourceLocation> {
        location(self.template.as_deref())
    }

    /// Configured values document location.
    #[must_use]
    pub fn parameters_location(&self) -> Option<SourceLocation> {
        location(self.parameters.as_deref())
    }

    /// Cache lifetime.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn location(raw: Option<&str>) -> Option<SourceLocation> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SourceLocation::parse)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn from_toml(toml: &str) -> ServerConfig {
        ServerConfig::from_figment(Figment::from(Toml::string(toml))).unwrap()
    }

    const INDIRECT: &str = r#"
        [sources]
        template = "https://example.com/azuredeploy.json"
        parameters = "https://example.com/azuredeploy.parameters.json"
        cache_ttl_secs = 60

        [backend]
        kind = "indirect"
        owner = "acme"
        repo = "infra"
        workflow = "deploy-vm.yml"
        token = "ghp_x"

        [[rules]]
        drop = "sshPublicKey"
        when = { parameter = "authenticationType", equals = "password" }
    "#;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.sources.cache_ttl(), Duration::ZERO);
        assert!(config.backend.is_none());
        assert!(config.rules.is_empty());
    }

    #[test]
    fn parses_complete_config() {
        let config = from_toml(INDIRECT);

        config.validate().unwrap();
        assert_eq!(config.backend.as_ref().unwrap().kind(), "indirect");
        assert_eq!(config.sources.cache_ttl(), Duration::from_secs(60));
        assert!(matches!(
            config.sources.template_location(),
            Some(SourceLocation::Remote(_))
        ));
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].drop, "sshPublicKey");
        assert_eq!(config.rules[0].when.equals, Some(serde_json::json!("password")));
    }

    #[test]
    fn empty_config_reports_template_and_backend() {
        let err = ServerConfig::default().validate().unwrap_err();
        let ConfigError::Missing { fields } = err else {
            panic!("expected missing fields, got {err}");
        };
        assert_eq!(fields, ["sources.template", "backend"]);
    }

    #[test]
    fn missing_credentials_are_named() {
        let config = from_toml(
            r#"
            [sources]
            template = "azuredeploy.json"

            [backend]
            kind = "direct"
            tenant_id = "tenant"
            client_id = "client"
            subscription_id = "sub"
            "#,
        );

        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "configuration missing: backend.client_secret");
    }

    #[rstest]
    #[case(r#"when = { parameter = "authenticationType" }"#)]
    #[case(r#"when = { parameter = "authenticationType", equals = "a", not_equals = "b" }"#)]
    #[case(r#"when = { parameter = "", equals = "password" }"#)]
    fn malformed_rules_are_rejected(#[case] when: &str) {
        let config = from_toml(&format!(
            r#"
            [sources]
            template = "azuredeploy.json"

            [backend]
            kind = "indirect"
            owner = "acme"
            repo = "infra"
            workflow = "deploy-vm.yml"
            token = "ghp_x"

            [[rules]]
            drop = "sshPublicKey"
            {when}
            "#
        ));

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_backend_kind_fails_to_parse() {
        let result = ServerConfig::from_figment(Figment::from(Toml::string(
            r#"
            [backend]
            kind = "carrier-pigeon"
            "#,
        )));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn blank_parameters_location_is_absent() {
        let config = from_toml(
            r#"
            [sources]
            template = "azuredeploy.json"
            parameters = "  "
            "#,
        );
        assert_eq!(config.sources.parameters_location(), None);
    }
}

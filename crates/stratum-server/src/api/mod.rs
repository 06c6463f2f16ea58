//! HTTP API.
//!
//! Provides endpoints for:
//! - Parameter metadata for form rendering (`/params`, `/api/params`)
//! - Deployment dispatch (`/deploy`, `/api/deploy`)
//! - Health checks

mod deploy;
mod params;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use stratum_dispatch::DeploymentBackend;
use stratum_template::{CachePolicy, OverrideRule, SourceLoader, SourceLocation, TemplateError};

pub use deploy::DeployRequest;
pub use params::{ParamsResponse, SourceQuery, UiParamsResponse};

/// Default source locations and the rule for overriding them per request.
#[derive(Debug, Clone)]
pub struct Sources {
    template: SourceLocation,
    parameters: Option<SourceLocation>,
}

impl Sources {
    /// Create source defaults.
    #[must_use]
    pub const fn new(template: SourceLocation, parameters: Option<SourceLocation>) -> Self {
        Self {
            template,
            parameters,
        }
    }

    /// Locations to load for a request.
    ///
    /// Each explicit location replaces its default independently and must be
    /// an HTTP(S) URL. Naming either one bypasses the cache.
    pub fn resolve(
        &self,
        template_url: Option<&str>,
        params_url: Option<&str>,
    ) -> Result<(SourceLocation, Option<SourceLocation>, CachePolicy), TemplateError> {
        let template_url = template_url.map(str::trim).filter(|s| !s.is_empty());
        let params_url = params_url.map(str::trim).filter(|s| !s.is_empty());

        let policy = if template_url.is_some() || params_url.is_some() {
            CachePolicy::Bypass
        } else {
            CachePolicy::Use
        };

        let template = match template_url {
            Some(url) => SourceLocation::remote(url)?,
            None => self.template.clone(),
        };
        let parameters = match params_url {
            Some(url) => Some(SourceLocation::remote(url)?),
            None => self.parameters.clone(),
        };

        Ok((template, parameters, policy))
    }
}

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Template source loader.
    pub loader: Arc<SourceLoader>,
    /// Configured deployment backend.
    pub backend: Arc<dyn DeploymentBackend>,
    /// Default source locations.
    pub sources: Arc<Sources>,
    /// Override rules applied on every dispatch.
    pub rules: Arc<[OverrideRule]>,
}

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Parameter metadata
        .route("/params", get(params::get_params))
        .route("/api/params", get(params::get_ui_params))
        // Dispatch
        .route("/deploy", post(deploy::deploy))
        .route("/api/deploy", post(deploy::deploy))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    backend: &'static str,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        backend: state.backend.name(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use stratum_dispatch::{DeploymentRequest, DispatchResult};
    use tower::ServiceExt;

    /// Backend that records requests and answers with a canned result.
    #[derive(Debug)]
    pub(crate) struct StubBackend {
        pub(crate) result: DispatchResult,
        pub(crate) requests: Mutex<Vec<DeploymentRequest>>,
    }

    impl StubBackend {
        pub(crate) fn answering(result: DispatchResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DeploymentBackend for StubBackend {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn dispatch(&self, request: &DeploymentRequest) -> DispatchResult {
            self.requests.lock().push(request.clone());
            self.result.clone()
        }
    }

    pub(crate) fn template_body() -> Value {
        json!({
            "parameters": {
                "vmName": { "type": "string", "defaultValue": "vm-01" },
                "vmSize": {
                    "type": "string",
                    "allowedValues": ["Standard_B1s", "Standard_B2s"],
                    "defaultValue": "Standard_B1s",
                    "metadata": { "description": "Size of the VM" }
                },
                "authenticationType": {
                    "type": "string",
                    "allowedValues": ["password", "sshPublicKey"],
                    "defaultValue": "password"
                },
                "sshPublicKey": { "type": "secureString", "defaultValue": "" },
                "instanceCount": { "type": "int", "defaultValue": 1 }
            },
            "resources": []
        })
    }

    pub(crate) fn values_body() -> Value {
        json!({ "parameters": { "vmSize": { "value": "Standard_B2s" } } })
    }

    pub(crate) fn write_json(dir: &Path, name: &str, body: &Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_vec(body).unwrap()).unwrap();
        path
    }

    /// State over local sources in `dir`, with a values document.
    pub(crate) fn state_in(dir: &Path, backend: Arc<dyn DeploymentBackend>, rules: Vec<OverrideRule>) -> AppState {
        let template = write_json(dir, "azuredeploy.json", &template_body());
        let values = write_json(dir, "azuredeploy.parameters.json", &values_body());

        AppState {
            loader: Arc::new(SourceLoader::new(Duration::from_secs(5)).unwrap()),
            backend,
            sources: Arc::new(Sources::new(
                SourceLocation::Local(template),
                Some(SourceLocation::Local(values)),
            )),
            rules: rules.into(),
        }
    }

    /// Serve raw documents by file name on a local port; other names are 404.
    pub(crate) async fn serve_documents(documents: Vec<(&'static str, String)>) -> String {
        let documents: Arc<HashMap<String, String>> = Arc::new(
            documents
                .into_iter()
                .map(|(name, body)| (name.to_owned(), body))
                .collect(),
        );

        let app = Router::new().route(
            "/{name}",
            get(move |axum::extract::Path(name): axum::extract::Path<String>| {
                let documents = Arc::clone(&documents);
                async move {
                    match documents.get(&name) {
                        Some(body) => (StatusCode::OK, body.clone()),
                        None => (StatusCode::NOT_FOUND, String::new()),
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = state_in(dir.path(), StubBackend::answering(DispatchResult::dispatched()), vec![]);

        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "healthy", "backend": "stub" }));
    }

    #[test]
    fn explicit_locations_bypass_cache() {
        let sources = Sources::new(
            SourceLocation::parse("https://example.com/t.json"),
            Some(SourceLocation::parse("https://example.com/p.json")),
        );

        let (template, parameters, policy) = sources.resolve(None, None).unwrap();
        assert_eq!(template, SourceLocation::parse("https://example.com/t.json"));
        assert_eq!(parameters, Some(SourceLocation::parse("https://example.com/p.json")));
        assert_eq!(policy, CachePolicy::Use);

        let (template, parameters, policy) = sources
            .resolve(Some("https://other.example/t.json"), Some(""))
            .unwrap();
        assert_eq!(template, SourceLocation::parse("https://other.example/t.json"));
        assert_eq!(parameters, Some(SourceLocation::parse("https://example.com/p.json")));
        assert_eq!(policy, CachePolicy::Bypass);

        let (_, parameters, policy) = sources
            .resolve(None, Some("http://localhost:9000/p.json"))
            .unwrap();
        assert_eq!(parameters, Some(SourceLocation::parse("http://localhost:9000/p.json")));
        assert_eq!(policy, CachePolicy::Bypass);
    }

    #[test]
    fn configured_local_defaults_are_kept() {
        let sources = Sources::new(SourceLocation::parse("./azuredeploy.json"), None);
        let (template, parameters, _) = sources.resolve(Some("  "), None).unwrap();
        assert_eq!(template, SourceLocation::parse("./azuredeploy.json"));
        assert_eq!(parameters, None);
    }

    #[rstest::rstest]
    #[case(Some("/etc/hostname"), None)]
    #[case(None, Some("file:///srv/prod.parameters.json"))]
    #[case(Some("https://example.com/t.json"), Some("../prod.parameters.json"))]
    fn explicit_local_locations_are_rejected(#[case] template: Option<&str>, #[case] params: Option<&str>) {
        let sources = Sources::new(SourceLocation::parse("https://example.com/t.json"), None);
        assert!(matches!(
            sources.resolve(template, params),
            Err(TemplateError::UnsupportedLocation { .. })
        ));
    }
}

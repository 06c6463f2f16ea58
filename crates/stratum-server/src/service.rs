//! Service lifecycle management.
//!
//! Builds the shared state from configuration, serves the API and shuts down
//! gracefully on Ctrl+C, SIGTERM or an explicit request.

use std::sync::Arc;

use stratum_dispatch::{create_backend, DeploymentBackend};
use stratum_template::SourceLoader;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{self, AppState, Sources};
use crate::config::{ConfigError, ServerConfig};
use crate::error::ServiceError;
use crate::trace::RequestTraceLayer;

/// The dispatch service.
pub struct StratumService {
    config: ServerConfig,
    cancel: CancellationToken,
}

impl StratumService {
    /// Create a service with the given configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the service when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServiceError> {
        let state = self.build_state()?;
        let listener = TcpListener::bind(self.config.server.listen).await?;
        self.serve(listener, state).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener, state: AppState) -> Result<(), ServiceError> {
        let app = api::router(state).layer(RequestTraceLayer::new());

        info!(listen = %listener.local_addr()?, "stratum listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.cancel.clone()))
            .await?;

        info!("stratum shutdown complete");
        Ok(())
    }

    /// Validate configuration and assemble the shared request state.
    pub fn build_state(&self) -> Result<AppState, ServiceError> {
        self.config.validate()?;

        let template = self
            .config
            .sources
            .template_location()
            .ok_or_else(|| ConfigError::Missing {
                fields: vec!["sources.template".to_owned()],
            })?;

        let loader = SourceLoader::new(self.config.http.timeout())?
            .with_cache_ttl(self.config.sources.cache_ttl());

        let backend = self.create_backend()?;

        info!(
            template = %template,
            cache_ttl_secs = self.config.sources.cache_ttl_secs,
            rules = self.config.rules.len(),
            "sources configured"
        );

        Ok(AppState {
            loader: Arc::new(loader),
            backend,
            sources: Arc::new(Sources::new(template, self.config.sources.parameters_location())),
            rules: self.config.rules.clone().into(),
        })
    }

    fn create_backend(&self) -> Result<Arc<dyn DeploymentBackend>, ServiceError> {
        let config = self.config.backend.as_ref().ok_or_else(|| ConfigError::Missing {
            fields: vec!["backend".to_owned()],
        })?;

        let backend = create_backend(config, self.config.http.timeout())?;
        info!(backend = config.kind(), "deployment backend configured");
        Ok(backend)
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
        () = cancel.cancelled() => {
            info!("shutdown requested");
        }
    }
}

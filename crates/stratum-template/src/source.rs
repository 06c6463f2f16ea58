//! Loading templates and parameter-values documents from files or URLs.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::SourceCache;
use crate::error::{Result, TemplateError};
use crate::schema::{ParameterValues, TemplateDocument};

/// Where a source document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Fetched over HTTP(S).
    Remote(String),
    /// Read from the local filesystem.
    Local(PathBuf),
}

impl SourceLocation {
    /// Interpret a location string.
    ///
    /// `http://` and `https://` locations are remote, a `file://` prefix is
    /// stripped, and anything else is a local path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Remote(raw.to_owned())
        } else {
            Self::Local(PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw)))
        }
    }

    /// Interpret a location that must be fetched over HTTP(S).
    ///
    /// Used for locations named by API callers, which never reach the local
    /// filesystem.
    pub fn remote(raw: &str) -> Result<Self> {
        match Self::parse(raw) {
            location @ Self::Remote(_) => Ok(location),
            Self::Local(_) => Err(TemplateError::UnsupportedLocation {
                location: raw.trim().to_owned(),
            }),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Whether a load may be served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Serve unexpired cached documents.
    Use,
    /// Always fetch; used when the caller names sources explicitly.
    Bypass,
}

/// The result of loading a template and its parameter values.
#[derive(Debug, Clone)]
pub struct LoadedSources {
    /// Parsed template.
    pub template: TemplateDocument,
    /// Values document; empty when no location was given.
    pub values: ParameterValues,
}

/// Fetches and parses template sources.
#[derive(Debug)]
pub struct SourceLoader {
    client: Client,
    cache: Option<SourceCache>,
}

impl SourceLoader {
    /// Create a loader whose remote fetches time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            cache: None,
        })
    }

    /// Cache fetched documents for `ttl`. A zero TTL leaves caching off.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = (!ttl.is_zero()).then(|| SourceCache::new(ttl));
        self
    }

    /// Load a template and, optionally, its parameter-values document.
    ///
    /// Both are fetched concurrently; failure of either fails the load.
    pub async fn load(
        &self,
        template: &SourceLocation,
        parameters: Option<&SourceLocation>,
        policy: CachePolicy,
    ) -> Result<LoadedSources> {
        let template_fut = async {
            let body = self.fetch_document(template, policy).await?;
            TemplateDocument::parse(&template.to_string(), body)
        };

        let values_fut = async {
            match parameters {
                Some(location) => {
                    let body = self.fetch_document(location, policy).await?;
                    ParameterValues::parse(&location.to_string(), &body)
                }
                None => Ok(ParameterValues::empty()),
            }
        };

        let (document, values) = tokio::try_join!(template_fut, values_fut)?;

        info!(
            template = %template,
            parameters = document.schema().len(),
            supplied_values = values.len(),
            "template sources loaded"
        );

        Ok(LoadedSources {
            template: document,
            values,
        })
    }

    async fn fetch_document(&self, location: &SourceLocation, policy: CachePolicy) -> Result<Value> {
        let key = location.to_string();

        if policy == CachePolicy::Use {
            if let Some(document) = self.cache.as_ref().and_then(|c| c.get(&key)) {
                debug!(location = %key, "serving source from cache");
                return Ok(document);
            }
        }

        let raw = match location {
            SourceLocation::Remote(url) => self.fetch_remote(url).await?,
            SourceLocation::Local(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| TemplateError::unavailable(&key, e))?,
        };

        let document: Value =
            serde_json::from_str(&raw).map_err(|e| TemplateError::malformed(&key, e))?;

        if let Some(cache) = &self.cache {
            cache.insert(&key, document.clone());
        }

        Ok(document)
    }

    async fn fetch_remote(&self, url: &str) -> Result<String> {
        debug!(url = %url, "fetching remote source");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TemplateError::unavailable(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TemplateError::unavailable(url, format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| TemplateError::unavailable(url, e))
    }
}

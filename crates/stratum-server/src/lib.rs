//! Stratum HTTP service.
//!
//! Exposes template parameter metadata for form rendering and dispatches
//! deployments to the configured backend:
//!
//! - `GET /params`, `GET /api/params`: declared parameters with effective values
//! - `POST /deploy`, `POST /api/deploy`: merge overrides, validate and dispatch
//! - `GET /health`
//!
//! Configuration is read with figment from `stratum.toml`, an optional file
//! and `STRATUM_` environment variables, and validated before the listener
//! is bound.

pub mod api;
pub mod config;
pub mod error;
pub mod report;
pub mod service;
pub mod trace;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ServiceError};
pub use service::StratumService;

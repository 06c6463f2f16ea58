//! Deployment request building and backend dispatch.
//!
//! A [`DeploymentRequest`] carries the final parameters, target and template.
//! A [`DeploymentBackend`] makes one attempt to deploy it and reports the
//! outcome as a [`DispatchResult`], never as an error: credential rejections,
//! upstream failures and timeouts are all classified results the caller can
//! report.

pub mod backend;
pub mod config;
pub mod error;
pub mod request;
pub mod result;

pub use backend::{create_backend, DeploymentBackend, DirectBackend, IndirectBackend};
pub use config::{BackendConfig, DirectConfig, IndirectConfig};
pub use error::{DispatchError, Result};
pub use request::DeploymentRequest;
pub use result::{DispatchFailure, DispatchResult, DispatchSuccess, FailureKind};

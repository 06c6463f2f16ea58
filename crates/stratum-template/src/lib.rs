//! Stratum template handling
//!
//! This crate turns an infrastructure template and an optional
//! parameter-values document into the parameter set a deployment is
//! submitted with.
//!
//! # Pipeline
//!
//! ```text
//! SourceLoader::load ──▶ build_metadata ──▶ (shown to the operator)
//!                                 │
//!                    overrides ──▶ merge ──▶ FinalParameters
//! ```
//!
//! - [`SourceLoader`] reads both documents from local paths or URLs,
//!   concurrently, with an optional TTL cache.
//! - [`build_metadata`] resolves each declared parameter's effective value:
//!   the values document wins over the template default, and a parameter
//!   with neither resolves to an empty string.
//! - [`merge`] layers operator overrides on top, enforcing declared types and
//!   allowed values, and applying declarative [`OverrideRule`]s.

#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod schema;
pub mod source;

pub use cache::SourceCache;
pub use error::{Result, TemplateError};
pub use merge::{merge, FinalParameters, OverrideRule, OverrideSet, RuleCondition, REDACTED};
pub use metadata::{build_metadata, ParameterMetadata};
pub use schema::{ParameterSchema, ParameterType, ParameterValues, TemplateDocument};
pub use source::{CachePolicy, LoadedSources, SourceLoader, SourceLocation};

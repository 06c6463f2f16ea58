//! Template parameter schema and parameter-values documents.
//!
//! A template declares its parameters under a top-level `parameters` object:
//!
//! ```json
//! {
//!   "parameters": {
//!     "env": {
//!       "type": "string",
//!       "defaultValue": "dev",
//!       "allowedValues": ["dev", "prod"],
//!       "metadata": { "description": "Target environment" }
//!     }
//!   }
//! }
//! ```
//!
//! A parameter-values document supplies values under the same key, each
//! wrapped as `{ "value": ... }`.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, TemplateError};

/// Declared type of a template parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterType {
    /// Plain string.
    String,
    /// Integer.
    Int,
    /// Boolean.
    Bool,
    /// String that must not be echoed back.
    SecureString,
    /// Object that must not be echoed back.
    SecureObject,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl ParameterType {
    /// Parse a template type name. Matching is case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            "securestring" => Some(Self::SecureString),
            "secureobject" => Some(Self::SecureObject),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    /// Returns true for types whose values must not be echoed back.
    #[must_use]
    pub const fn is_secure(self) -> bool {
        matches!(self, Self::SecureString | Self::SecureObject)
    }

    /// Canonical name as written in templates.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::SecureString => "secureString",
            Self::SecureObject => "secureObject",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter declared by a template.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    /// Parameter name (unique within the template).
    pub name: String,
    /// Declared type.
    pub param_type: ParameterType,
    /// Allowed literal values, in declared order.
    pub allowed_values: Option<Vec<Value>>,
    /// Template-level default.
    pub default_value: Option<Value>,
    /// Human-readable description.
    pub description: String,
}

/// A parsed infrastructure template: its parameter schema plus the raw body
/// submitted to the resource manager.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    schema: Vec<ParameterSchema>,
    body: Value,
}

impl TemplateDocument {
    /// Parse a template, extracting its parameter schema in declared order.
    pub fn parse(location: &str, body: Value) -> Result<Self> {
        let parameters = parameters_object(location, &body)?;

        let schema = parameters
            .iter()
            .map(|(name, declaration)| parse_declaration(location, name, declaration))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { schema, body })
    }

    /// Declared parameters in template order.
    #[must_use]
    pub fn schema(&self) -> &[ParameterSchema] {
        &self.schema
    }

    /// The full template body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Consume the document, returning the template body.
    #[must_use]
    pub fn into_body(self) -> Value {
        self.body
    }
}

fn parse_declaration(location: &str, name: &str, declaration: &Value) -> Result<ParameterSchema> {
    let Some(declaration) = declaration.as_object() else {
        return Err(TemplateError::malformed(
            location,
            format!("parameter `{name}` is not an object"),
        ));
    };

    let param_type = match declaration.get("type") {
        None | Some(Value::Null) => ParameterType::String,
        Some(Value::String(raw)) => ParameterType::parse(raw).ok_or_else(|| {
            TemplateError::malformed(location, format!("parameter `{name}` has unknown type `{raw}`"))
        })?,
        Some(other) => {
            return Err(TemplateError::malformed(
                location,
                format!("parameter `{name}` has non-string type {other}"),
            ))
        }
    };

    let allowed_values = match declaration.get("allowedValues") {
        None | Some(Value::Null) => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(_) => {
            return Err(TemplateError::malformed(
                location,
                format!("parameter `{name}` has non-array allowedValues"),
            ))
        }
    };

    let description = declaration
        .get("metadata")
        .and_then(|m| m.get("description"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    Ok(ParameterSchema {
        name: name.to_owned(),
        param_type,
        allowed_values,
        default_value: declaration.get("defaultValue").cloned(),
        description,
    })
}

/// Values supplied by a parameter-values document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterValues(Map<String, Value>);

impl ParameterValues {
    /// An empty values document.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a parameter-values document.
    ///
    /// Entries without a `value` key (for example Key Vault references) are
    /// treated as absent.
    pub fn parse(location: &str, body: &Value) -> Result<Self> {
        let parameters = parameters_object(location, body)?;

        let values = parameters
            .iter()
            .filter_map(|(name, entry)| {
                entry
                    .get("value")
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect();

        Ok(Self(values))
    }

    /// Supplied value for a parameter, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of supplied values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no values are supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for ParameterValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn parameters_object<'a>(location: &str, body: &'a Value) -> Result<&'a Map<String, Value>> {
    body.get("parameters")
        .and_then(Value::as_object)
        .ok_or_else(|| TemplateError::malformed(location, "missing `parameters` object"))
}

//! Resolved, display-ready parameter metadata.

use serde::Serialize;
use serde_json::Value;

use crate::schema::{ParameterSchema, ParameterType, ParameterValues};

/// A template parameter with its effective value resolved.
///
/// The effective value is the parameter-values document entry if present,
/// else the template default if present, else an empty string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMetadata {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Allowed values, if the template restricts them.
    pub allowed_values: Option<Vec<Value>>,
    /// Description from the template metadata.
    pub description: String,
    /// Template-level default, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Effective value.
    pub value: Value,
}

/// Build display metadata for every declared parameter, in declared order.
///
/// Never fails: parameters without any value resolve to an empty string so
/// incomplete configuration still produces something displayable.
#[must_use]
pub fn build_metadata(schema: &[ParameterSchema], values: &ParameterValues) -> Vec<ParameterMetadata> {
    schema
        .iter()
        .map(|parameter| ParameterMetadata {
            name: parameter.name.clone(),
            param_type: parameter.param_type,
            allowed_values: parameter.allowed_values.clone(),
            description: parameter.description.clone(),
            default_value: parameter.default_value.clone(),
            value: values
                .get(&parameter.name)
                .or(parameter.default_value.as_ref())
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
        })
        .collect()
}

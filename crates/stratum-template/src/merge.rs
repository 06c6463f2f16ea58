//! Layering user overrides on top of resolved parameter metadata.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, TemplateError};
use crate::metadata::ParameterMetadata;
use crate::schema::ParameterType;

/// Final parameter set, keyed by name in template order.
pub type FinalParameters = Map<String, Value>;

/// User-submitted values, keyed by parameter name.
pub type OverrideSet = Map<String, Value>;

/// Stands in for rejected values of secure parameters.
pub const REDACTED: &str = "[redacted]";

/// Declarative rule discarding an override when another parameter makes it
/// irrelevant.
///
/// ```toml
/// [[rules]]
/// drop = "sshPublicKey"
/// when = { parameter = "authenticationType", equals = "password" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverrideRule {
    /// Parameter whose override is discarded.
    pub drop: String,
    /// Condition under which the override is discarded.
    pub when: RuleCondition,
}

/// Condition on another parameter's value.
///
/// The value tested is the override if one was submitted, otherwise the
/// parameter's effective value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleCondition {
    /// Parameter being tested.
    pub parameter: String,
    /// Matches when the value equals this.
    #[serde(default)]
    pub equals: Option<Value>,
    /// Matches when the value differs from this.
    #[serde(default)]
    pub not_equals: Option<Value>,
}

impl RuleCondition {
    /// Returns true if exactly one comparison is configured.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.equals.is_some() != self.not_equals.is_some()
    }

    fn matches(&self, value: &Value) -> bool {
        match (&self.equals, &self.not_equals) {
            (Some(expected), None) => loosely_equal(value, expected),
            (None, Some(excluded)) => !loosely_equal(value, excluded),
            _ => false,
        }
    }
}

/// Merge overrides over resolved metadata into the final parameter set.
///
/// Rules are applied first. Every declared parameter is then covered: an
/// override is coerced to the declared type and checked against
/// `allowedValues`, otherwise the effective value is adopted. Overrides for
/// undeclared names are ignored.
pub fn merge(
    metadata: &[ParameterMetadata],
    overrides: &OverrideSet,
    rules: &[OverrideRule],
) -> Result<FinalParameters> {
    let mut overrides = overrides.clone();
    apply_rules(metadata, &mut overrides, rules);

    let ignored: Vec<&str> = overrides
        .keys()
        .filter(|key| !metadata.iter().any(|m| &m.name == *key))
        .map(String::as_str)
        .collect();
    if !ignored.is_empty() {
        debug!(ignored = ?ignored, "ignoring overrides for undeclared parameters");
    }

    let mut merged = FinalParameters::new();
    for parameter in metadata {
        let value = match overrides.get(&parameter.name) {
            Some(submitted) => {
                let value = coerce(&parameter.name, parameter.param_type, submitted)?;
                check_allowed(parameter, &value)?;
                value
            }
            None => parameter.value.clone(),
        };
        merged.insert(parameter.name.clone(), value);
    }

    Ok(merged)
}

fn apply_rules(metadata: &[ParameterMetadata], overrides: &mut OverrideSet, rules: &[OverrideRule]) {
    for rule in rules {
        if !overrides.contains_key(&rule.drop) {
            continue;
        }

        let tested = overrides.get(&rule.when.parameter).or_else(|| {
            metadata
                .iter()
                .find(|m| m.name == rule.when.parameter)
                .map(|m| &m.value)
        });

        if tested.is_some_and(|value| rule.when.matches(value)) {
            debug!(
                dropped = %rule.drop,
                condition = %rule.when.parameter,
                "discarding override made irrelevant by rule"
            );
            overrides.remove(&rule.drop);
        }
    }
}

fn check_allowed(parameter: &ParameterMetadata, value: &Value) -> Result<()> {
    match &parameter.allowed_values {
        Some(allowed) if !allowed.contains(value) => Err(TemplateError::DisallowedValue {
            name: parameter.name.clone(),
            value: reported(parameter.param_type, value),
            allowed: allowed.clone(),
        }),
        _ => Ok(()),
    }
}

/// Interpret a submitted value as the declared type.
///
/// Form fields arrive as strings, so numeric, boolean and JSON-typed
/// parameters are parsed from their textual form.
fn coerce(name: &str, expected: ParameterType, value: &Value) -> Result<Value> {
    let coerced = match (expected, value) {
        (ParameterType::String | ParameterType::SecureString, Value::String(_)) => Some(value.clone()),
        (ParameterType::String | ParameterType::SecureString, Value::Number(n)) => {
            Some(Value::String(n.to_string()))
        }
        (ParameterType::String | ParameterType::SecureString, Value::Bool(b)) => {
            Some(Value::String(b.to_string()))
        }
        (ParameterType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        (ParameterType::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ParameterType::Bool, Value::Bool(_)) => Some(value.clone()),
        (ParameterType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (ParameterType::Array, Value::Array(_)) => Some(value.clone()),
        (ParameterType::Array, Value::String(s)) => {
            serde_json::from_str::<Value>(s).ok().filter(Value::is_array)
        }
        (ParameterType::Object | ParameterType::SecureObject, Value::Object(_)) => Some(value.clone()),
        (ParameterType::Object | ParameterType::SecureObject, Value::String(s)) => {
            serde_json::from_str::<Value>(s).ok().filter(Value::is_object)
        }
        _ => None,
    };

    coerced.ok_or_else(|| TemplateError::TypeMismatch {
        name: name.to_owned(),
        expected,
        value: reported(expected, value),
    })
}

/// The form of a rejected value that may appear in errors and logs.
fn reported(param_type: ParameterType, value: &Value) -> Value {
    if param_type.is_secure() {
        Value::String(REDACTED.to_owned())
    } else {
        value.clone()
    }
}

/// Equality that treats a string and a scalar with the same text as equal.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::Number(_) | Value::Bool(_)) => *s == b.to_string(),
        (Value::Number(_) | Value::Bool(_), Value::String(s)) => *s == a.to_string(),
        _ => a == b,
    }
}

//! Backend-neutral deployment requests.

use serde_json::{Map, Value};

use crate::error::{DispatchError, Result};

/// Everything a backend needs to perform one deployment.
///
/// Parameters are held as plain values; wrapping them in whatever envelope a
/// backend expects is that backend's job.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRequest {
    /// Region the resource group is created in.
    pub location: String,
    /// Target resource group.
    pub resource_group: String,
    /// Name of the deployment.
    pub deployment_name: String,
    /// Final parameter values, one per declared template parameter.
    pub parameters: Map<String, Value>,
    /// Template body.
    pub template: Value,
}

impl DeploymentRequest {
    /// Build a request, rejecting empty identifiers.
    pub fn build(
        resource_group: impl Into<String>,
        deployment_name: impl Into<String>,
        location: impl Into<String>,
        parameters: Map<String, Value>,
        template: Value,
    ) -> Result<Self> {
        let resource_group = required("resourceGroup", resource_group.into())?;
        let deployment_name = required("deploymentName", deployment_name.into())?;
        let location = required("location", location.into())?;

        Ok(Self {
            location,
            resource_group,
            deployment_name,
            parameters,
            template,
        })
    }
}

fn required(field: &'static str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DispatchError::MissingRequiredField { field });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn parameters() -> Map<String, Value> {
        json!({ "env": "dev" }).as_object().cloned().unwrap()
    }

    #[test]
    fn builds_with_all_fields() {
        let request = DeploymentRequest::build(
            "rg-app",
            "deploy-1",
            " westeurope ",
            parameters(),
            json!({ "resources": [] }),
        )
        .unwrap();

        assert_eq!(request.resource_group, "rg-app");
        assert_eq!(request.deployment_name, "deploy-1");
        assert_eq!(request.location, "westeurope");
        assert_eq!(request.parameters["env"], json!("dev"));
    }

    #[rstest]
    #[case("", "deploy-1", "westeurope", "resourceGroup")]
    #[case("rg-app", "  ", "westeurope", "deploymentName")]
    #[case("rg-app", "deploy-1", "", "location")]
    fn rejects_empty_identifiers(
        #[case] resource_group: &str,
        #[case] deployment_name: &str,
        #[case] location: &str,
        #[case] expected: &str,
    ) {
        let err = DeploymentRequest::build(
            resource_group,
            deployment_name,
            location,
            parameters(),
            json!({}),
        )
        .unwrap_err();

        match err {
            DispatchError::MissingRequiredField { field } => assert_eq!(field, expected),
            other => panic!("expected MissingRequiredField, got {other:?}"),
        }
    }
}

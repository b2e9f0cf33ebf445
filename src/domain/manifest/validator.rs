// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::manifest::Manifest;
use crate::infrastructure::constants::{
    FIELD_API_VERSION, FIELD_KIND, FIELD_METADATA_NAME, FIELD_METADATA_NAMESPACE,
};
use crate::shared::error::{ResourceRef, ValidationError};
use serde_json::Value;

/// A manifest whose identity fields are known to be present and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedManifest {
    api_version: String,
    kind: String,
    name: String,
    namespace: Option<String>,
    body: Value,
}

impl ValidatedManifest {
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(&self.kind, &self.name, self.namespace.as_ref())
    }
}

/// Check the fields every apply needs, in order, stopping at the first failure.
///
/// 1. `apiVersion`
/// 2. `kind`
/// 3. `metadata.name`
/// 4. `metadata.namespace` when the caller declares the target namespaced
/// 5. no `metadata.namespace` when the caller declares it cluster-scoped
pub fn validate(
    manifest: &Manifest,
    namespaced: bool,
) -> Result<ValidatedManifest, ValidationError> {
    let value = manifest.value();

    let api_version = required_string(value, "/apiVersion", FIELD_API_VERSION)?;
    let kind = required_string(value, "/kind", FIELD_KIND)?;
    let name = required_string(value, "/metadata/name", FIELD_METADATA_NAME)?;
    let namespace = validate_namespace(value, namespaced)?;

    Ok(ValidatedManifest {
        api_version,
        kind,
        name,
        namespace,
        body: value.clone(),
    })
}

fn validate_namespace(value: &Value, namespaced: bool) -> Result<Option<String>, ValidationError> {
    if namespaced {
        return required_string(value, "/metadata/namespace", FIELD_METADATA_NAMESPACE).map(Some);
    }

    match value.pointer("/metadata/namespace") {
        None | Some(Value::Null) => Ok(None),
        Some(_) => Err(ValidationError::UnexpectedField(FIELD_METADATA_NAMESPACE)),
    }
}

fn required_string(
    value: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<String, ValidationError> {
    match value.pointer(pointer) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::String(text)) if text.is_empty() => Err(ValidationError::MissingField(field)),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(ValidationError::InvalidField {
            field,
            reason: format!("expected a string, found {}", json_type(other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(value: Value) -> Manifest {
        Manifest::from_value(value).unwrap()
    }

    fn deployment() -> Value {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": "web", "namespace": "prod" },
            "spec": { "replicas": 2 }
        })
    }

    #[test]
    fn test_valid_namespaced_manifest() {
        let validated = validate(&manifest(deployment()), true).unwrap();
        assert_eq!(validated.api_version(), "apps/v1");
        assert_eq!(validated.kind(), "Deployment");
        assert_eq!(validated.name(), "web");
        assert_eq!(validated.namespace(), Some("prod"));
        assert_eq!(validated.body(), &deployment());
        assert_eq!(validated.resource_ref().to_string(), "Deployment prod/web");
    }

    #[test]
    fn test_checks_run_in_order() {
        // Everything missing reports apiVersion first.
        assert_eq!(
            validate(&manifest(json!({})), true),
            Err(ValidationError::MissingField("apiVersion"))
        );
        assert_eq!(
            validate(&manifest(json!({ "apiVersion": "v1" })), true),
            Err(ValidationError::MissingField("kind"))
        );
        assert_eq!(
            validate(&manifest(json!({ "apiVersion": "v1", "kind": "ConfigMap" })), true),
            Err(ValidationError::MissingField("metadata.name"))
        );
        assert_eq!(
            validate(
                &manifest(json!({
                    "apiVersion": "v1",
                    "kind": "ConfigMap",
                    "metadata": { "name": "a" }
                })),
                true
            ),
            Err(ValidationError::MissingField("metadata.namespace"))
        );
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let mut value = deployment();
        value["kind"] = json!("");
        assert_eq!(
            validate(&manifest(value), true),
            Err(ValidationError::MissingField("kind"))
        );

        let mut value = deployment();
        value["metadata"]["namespace"] = json!("");
        assert_eq!(
            validate(&manifest(value), true),
            Err(ValidationError::MissingField("metadata.namespace"))
        );
    }

    #[test]
    fn test_non_string_fields_are_invalid() {
        let mut value = deployment();
        value["metadata"]["name"] = json!(42);
        assert_eq!(
            validate(&manifest(value), true),
            Err(ValidationError::InvalidField {
                field: "metadata.name",
                reason: "expected a string, found a number".to_string(),
            })
        );
    }

    #[test]
    fn test_cluster_scoped_manifest() {
        let value = json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRole",
            "metadata": { "name": "reader" }
        });
        let validated = validate(&manifest(value), false).unwrap();
        assert_eq!(validated.namespace(), None);

        assert_eq!(
            validate(&manifest(deployment()), false),
            Err(ValidationError::UnexpectedField("metadata.namespace"))
        );
    }
}

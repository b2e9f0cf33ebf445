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

use crate::domain::resource::{DiscoveredResource, GroupVersion, ResourceCoordinate};
use crate::infrastructure::constants::HTTP_CONFLICT;
use crate::infrastructure::kubernetes::conflict::parse_conflict_message;
use crate::shared::error::{FieldConflict, KubeError};
use http_body_util::BodyExt;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use kube::client::Body;
use kube::core::{GroupVersionKind, Request};
use kube::Client;
use thiserror::Error;

/// Failure reported by the API server collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiServerError {
    /// The server answered with a failure `Status`.
    #[error("{code} {reason}: {message}")]
    Status {
        code: u16,
        reason: String,
        message: String,
        conflicts: Vec<FieldConflict>,
        /// The `Status` object the server sent, when it sent one.
        body: Option<serde_json::Value>,
    },

    /// The request never produced a server answer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiServerError {
    pub fn status(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            reason: reason.into(),
            message: message.into(),
            conflicts: Vec::new(),
            body: None,
        }
    }

    /// Build the failure for a non-success answer from its raw body.
    pub fn from_response(code: u16, raw: &[u8]) -> Self {
        let body = serde_json::from_slice::<serde_json::Value>(raw)
            .ok()
            .filter(serde_json::Value::is_object);
        let text = |key: &str| {
            body.as_ref()
                .and_then(|body| body.get(key))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        };
        let reason = text("reason").unwrap_or_default();
        let message = text("message")
            .unwrap_or_else(|| String::from_utf8_lossy(raw).trim().to_string());
        let conflicts = if code == HTTP_CONFLICT {
            parse_conflict_message(&message)
        } else {
            Vec::new()
        };
        Self::Status {
            code,
            reason,
            message,
            conflicts,
            body,
        }
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            ApiServerError::Status { code, .. } => Some(*code),
            ApiServerError::Transport(_) => None,
        }
    }
}

impl From<kube::Error> for ApiServerError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) => {
                let body = serde_json::to_value(&ae).ok();
                let conflicts = if ae.code == HTTP_CONFLICT {
                    parse_conflict_message(&ae.message)
                } else {
                    Vec::new()
                };
                ApiServerError::Status {
                    code: ae.code,
                    reason: ae.reason,
                    message: ae.message,
                    conflicts,
                    body,
                }
            }
            other => ApiServerError::Transport(other.to_string()),
        }
    }
}

/// Successful answer to an apply patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResponse {
    pub status: u16,
    pub object: serde_json::Value,
}

#[async_trait::async_trait]
pub trait ApiServerClient: Send + Sync {
    /// List the resource types served under one group version.
    async fn discover(
        &self,
        group_version: &GroupVersion,
    ) -> Result<Vec<DiscoveredResource>, ApiServerError>;

    /// Issue a single server-side apply patch.
    async fn patch(
        &self,
        coordinate: &ResourceCoordinate,
        name: &str,
        namespace: Option<&str>,
        body: &serde_json::Value,
        field_manager: &str,
        force: bool,
    ) -> Result<PatchResponse, ApiServerError>;
}

/// [`ApiServerClient`] backed by a live `kube::Client`.
pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    pub async fn new() -> Result<Self, KubeError> {
        let client = Client::try_default().await.map_err(|e| {
            KubeError::KubeError(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn get_client(&self) -> Client {
        self.client.clone()
    }

    pub async fn new_with_config(
        kubeconfig_path: Option<String>,
        context: Option<String>,
    ) -> Result<Self, KubeError> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        if kubeconfig_path.is_none() && context.is_none() {
            return Self::new().await;
        }

        let kubeconfig = if let Some(path) = kubeconfig_path {
            Kubeconfig::read_from(path)
                .map_err(|e| KubeError::KubeError(format!("Failed to load kubeconfig: {}", e)))?
        } else {
            Kubeconfig::read()
                .map_err(|e| KubeError::KubeError(format!("Failed to load kubeconfig: {}", e)))?
        };

        let config_options = KubeConfigOptions {
            context,
            cluster: None,
            user: None,
        };

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
            .await
            .map_err(|e| {
                KubeError::KubeError(format!("Failed to create Kubernetes config: {}", e))
            })?;

        let client = Client::try_from(config).map_err(|e| {
            KubeError::KubeError(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self { client })
    }

    fn dynamic_api(
        &self,
        coordinate: &ResourceCoordinate,
        namespace: Option<&str>,
    ) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&coordinate.group, &coordinate.version, &coordinate.kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, &coordinate.plural);
        match namespace {
            Some(namespace) if coordinate.namespaced => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }
}

#[async_trait::async_trait]
impl ApiServerClient for KubeApiClient {
    async fn discover(
        &self,
        group_version: &GroupVersion,
    ) -> Result<Vec<DiscoveredResource>, ApiServerError> {
        let list = if group_version.is_core() {
            self.client
                .list_core_api_resources(&group_version.version)
                .await?
        } else {
            self.client
                .list_api_group_resources(&group_version.api_version())
                .await?
        };

        // Subresources such as `deployments/scale` are not apply targets.
        Ok(list
            .resources
            .into_iter()
            .filter(|resource| !resource.name.contains('/'))
            .map(|resource| {
                DiscoveredResource::new(resource.kind, resource.name, resource.namespaced)
            })
            .collect())
    }

    async fn patch(
        &self,
        coordinate: &ResourceCoordinate,
        name: &str,
        namespace: Option<&str>,
        body: &serde_json::Value,
        field_manager: &str,
        force: bool,
    ) -> Result<PatchResponse, ApiServerError> {
        let api = self.dynamic_api(coordinate, namespace);
        let mut patch_params = PatchParams::apply(field_manager);
        if force {
            patch_params = patch_params.force();
        }

        // Sent as a raw request so the answer's status line is kept.
        let request = Request::new(api.resource_url())
            .patch(name, &patch_params, &Patch::Apply(body))
            .map_err(|e| ApiServerError::Transport(format!("Failed to build request: {}", e)))?;
        let response = self.client.send(request.map(Body::from)).await?;
        let status = response.status();
        let raw = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ApiServerError::Transport(format!("Failed to read response: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(ApiServerError::from_response(status.as_u16(), &raw));
        }

        let object = serde_json::from_slice(&raw)
            .map_err(|e| ApiServerError::Transport(format!("Failed to decode response: {}", e)))?;
        Ok(PatchResponse {
            status: status.as_u16(),
            object,
        })
    }
}

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

use crate::domain::apply::engine::{ApplyEngine, ApplyRequest, ApplyResult};
use crate::domain::config::ApplyConfig;
use crate::domain::manifest::{validate, Manifest, ManifestSource};
use crate::domain::resource::{ensure_scope, ResourceCoordinate, ResourceResolver};
use crate::infrastructure::constants::HTTP_NOT_FOUND;
use crate::infrastructure::kubernetes::{ApiServerClient, DiscoveryCache, KubeApiClient};
use crate::shared::error::{ApplyError, KubeError, ResourceRef};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Validates, resolves and applies manifests against one API server.
pub struct ManifestApplier {
    resolver: ResourceResolver,
    engine: ApplyEngine,
    field_manager: String,
    force_conflicts: bool,
}

impl ManifestApplier {
    /// Build an applier around an existing cache. The cache may be shared
    /// with other appliers talking to the same server.
    pub fn new(
        client: Arc<dyn ApiServerClient>,
        cache: Arc<DiscoveryCache>,
        config: &ApplyConfig,
    ) -> Self {
        Self {
            resolver: ResourceResolver::new(cache),
            engine: ApplyEngine::new(client).with_request_timeout(config.request_timeout()),
            field_manager: config.field_manager.clone(),
            force_conflicts: config.force_conflicts,
        }
    }

    /// Build an applier with a fresh cache sized from `config`.
    pub fn with_client(client: Arc<dyn ApiServerClient>, config: &ApplyConfig) -> Self {
        let cache = DiscoveryCache::new(client.clone())
            .with_ttl(config.discovery_ttl())
            .with_request_timeout(config.request_timeout());
        Self::new(client, Arc::new(cache), config)
    }

    /// Connect using the kubeconfig and context named in `config`.
    pub async fn from_config(config: &ApplyConfig) -> Result<Self, KubeError> {
        config.validate()?;
        let client =
            KubeApiClient::new_with_config(config.kubeconfig.clone(), config.context.clone())
                .await?;
        Ok(Self::with_client(Arc::new(client), config))
    }

    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        self.resolver.cache()
    }

    pub fn field_manager(&self) -> &str {
        &self.field_manager
    }

    pub async fn resolve(
        &self,
        api_version: &str,
        kind: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceCoordinate, KubeError> {
        self.resolver
            .resolve(api_version, kind, cancel)
            .await
            .map_err(|source| {
                tracing::warn!(api_version, kind, error = %source, "resolution failed");
                KubeError::resolution(ResourceRef::new(kind, "", None::<String>), source)
            })
    }

    pub async fn apply_manifest(
        &self,
        manifest: &Manifest,
        namespaced: bool,
        cancel: &CancellationToken,
    ) -> Result<ApplyResult, KubeError> {
        let validated = validate(manifest, namespaced).map_err(|source| {
            let resource = manifest.resource_ref();
            tracing::warn!(%resource, error = %source, "manifest rejected before apply");
            KubeError::validation(resource, source)
        })?;
        let resource = validated.resource_ref();

        let coordinate = self
            .resolver
            .resolve(validated.api_version(), validated.kind(), cancel)
            .await
            .and_then(|coordinate| {
                ensure_scope(&coordinate, namespaced)?;
                Ok(coordinate)
            })
            .map_err(|source| {
                tracing::warn!(%resource, error = %source, "resource type resolution failed");
                KubeError::resolution(resource.clone(), source)
            })?;

        tracing::debug!(
            %resource,
            plural = %coordinate.plural,
            namespaced = coordinate.namespaced,
            "resolved resource type"
        );

        let group_version = coordinate.group_version();
        let request = ApplyRequest {
            manifest: validated,
            coordinate,
            field_manager: self.field_manager.clone(),
            force_conflicts: self.force_conflicts,
        };

        match self.engine.apply(request, cancel).await {
            Ok(result) => {
                tracing::info!(
                    resource = %result.resource,
                    status = result.http_status,
                    "applied"
                );
                Ok(result)
            }
            Err(err) => {
                if let ApplyError::Rejected { status, .. } = &err {
                    if *status == HTTP_NOT_FOUND {
                        // The type may have been removed since it was discovered.
                        self.resolver.cache().invalidate(&group_version);
                    }
                }
                match &err {
                    ApplyError::Transport { .. } | ApplyError::Timeout { .. } => {
                        tracing::error!(error = %err, retryable = true, "apply failed")
                    }
                    _ => tracing::warn!(error = %err, "apply failed"),
                }
                Err(err.into())
            }
        }
    }

    /// Apply every document of `source` in order, stopping at the first failure.
    pub async fn apply_source(
        &self,
        source: &ManifestSource,
        namespaced: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<ApplyResult>, KubeError> {
        let text = source.read().await.inspect_err(|err| {
            tracing::warn!(%source, error = %err, "failed to read manifest source");
        })?;
        let manifests = Manifest::decode_all(&text).inspect_err(|err| match err {
            KubeError::Document { document, .. } => {
                tracing::warn!(%source, document, error = %err, "failed to decode manifest")
            }
            _ => tracing::warn!(%source, error = %err, "failed to decode manifest"),
        })?;
        tracing::debug!(%source, documents = manifests.len(), "decoded manifest source");

        let mut results = Vec::with_capacity(manifests.len());
        for manifest in &manifests {
            results.push(self.apply_manifest(manifest, namespaced, cancel).await?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{DiscoveredResource, GroupVersion};
    use crate::infrastructure::kubernetes::{ApiServerError, PatchResponse};
    use crate::shared::error::{ResolutionError, ValidationError};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `v1` with ConfigMap and Namespace; patches answer from a queue.
    #[derive(Default)]
    struct CoreOnly {
        discover_calls: AtomicUsize,
        patch_calls: AtomicUsize,
        patch_errors: Mutex<Vec<ApiServerError>>,
    }

    #[async_trait::async_trait]
    impl ApiServerClient for CoreOnly {
        async fn discover(
            &self,
            group_version: &GroupVersion,
        ) -> Result<Vec<DiscoveredResource>, ApiServerError> {
            self.discover_calls.fetch_add(1, Ordering::SeqCst);
            if group_version.is_core() && group_version.version == "v1" {
                Ok(vec![
                    DiscoveredResource::new("ConfigMap", "configmaps", true),
                    DiscoveredResource::new("Namespace", "namespaces", false),
                ])
            } else {
                Err(ApiServerError::status(404, "NotFound", "not served"))
            }
        }

        async fn patch(
            &self,
            _coordinate: &ResourceCoordinate,
            _name: &str,
            _namespace: Option<&str>,
            body: &serde_json::Value,
            _field_manager: &str,
            _force: bool,
        ) -> Result<PatchResponse, ApiServerError> {
            self.patch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.patch_errors.lock().pop() {
                return Err(err);
            }
            Ok(PatchResponse {
                status: 200,
                object: body.clone(),
            })
        }
    }

    fn applier(server: &Arc<CoreOnly>) -> ManifestApplier {
        ManifestApplier::with_client(server.clone(), &ApplyConfig::default())
    }

    fn config_map(name: &str) -> Manifest {
        Manifest::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": name, "namespace": "default" },
            "data": { "key": "value" }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_apply_manifest() {
        let server = Arc::new(CoreOnly::default());
        let applier = applier(&server);

        let result = applier
            .apply_manifest(&config_map("a"), true, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.coordinate.plural, "configmaps");
        assert_eq!(result.applied["data"]["key"], "value");
        assert_eq!(applier.field_manager(), "kube-apply");
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_calls() {
        let server = Arc::new(CoreOnly::default());
        let applier = applier(&server);
        let manifest = Manifest::from_value(json!({ "kind": "ConfigMap" })).unwrap();

        let err = applier
            .apply_manifest(&manifest, true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KubeError::Validation {
                source: ValidationError::MissingField("apiVersion"),
                ..
            }
        ));
        assert_eq!(server.discover_calls.load(Ordering::SeqCst), 0);
        assert_eq!(server.patch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scope_mismatch_is_reported_before_patch() {
        let server = Arc::new(CoreOnly::default());
        let applier = applier(&server);
        let manifest = Manifest::from_value(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": "prod", "namespace": "default" }
        }))
        .unwrap();

        let err = applier
            .apply_manifest(&manifest, true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KubeError::Resolution {
                source: ResolutionError::NamespaceMismatch { .. },
                ..
            }
        ));
        assert_eq!(err.kind(), "NamespaceMismatch");
        assert_eq!(server.patch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_found_on_apply_invalidates_cache() {
        let server = Arc::new(CoreOnly::default());
        server.patch_errors.lock().push(ApiServerError::status(
            404,
            "NotFound",
            "the server could not find the requested resource",
        ));
        let applier = applier(&server);
        let token = CancellationToken::new();

        let err = applier
            .apply_manifest(&config_map("a"), true, &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "Rejected");
        assert!(applier.cache().is_empty());

        applier.apply_manifest(&config_map("a"), true, &token).await.unwrap();
        assert_eq!(server.discover_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_apply_source_stops_at_first_failure() {
        let server = Arc::new(CoreOnly::default());
        let applier = applier(&server);
        let source = ManifestSource::Inline(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: default\n\
             ---\n\
             apiVersion: v1\nkind: ConfigMap\nmetadata:\n  namespace: default\n\
             ---\n\
             apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n  namespace: default\n"
                .to_string(),
        );

        let err = applier
            .apply_source(&source, true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Validation { .. }));
        assert_eq!(server.patch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_type() {
        let server = Arc::new(CoreOnly::default());
        let applier = applier(&server);

        let err = applier
            .resolve("example.com/v1", "Widget", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownResourceType");
    }

    #[tokio::test]
    async fn test_undecodable_document_applies_nothing() {
        let server = Arc::new(CoreOnly::default());
        let applier = applier(&server);
        let source = ManifestSource::Inline(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: default\n\
             ---\n\
             just some text\n\
             ---\n\
             apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n  namespace: default\n"
                .to_string(),
        );

        let err = applier
            .apply_source(&source, true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Document { document: 2, .. }));
        assert_eq!(err.kind(), "NotAnObject");
        assert_eq!(server.discover_calls.load(Ordering::SeqCst), 0);
        assert_eq!(server.patch_calls.load(Ordering::SeqCst), 0);
    }
}

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

use crate::domain::manifest::ValidatedManifest;
use crate::domain::resource::ResourceCoordinate;
use crate::infrastructure::constants::{
    DEFAULT_REQUEST_TIMEOUT_SECS, HTTP_CONFLICT, HTTP_TOO_MANY_REQUESTS,
};
use crate::infrastructure::kubernetes::{ApiServerClient, ApiServerError};
use crate::shared::cancel::{bounded, Bounded};
use crate::shared::error::{ApplyError, ResourceRef};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One server-side apply, consumed by [`ApplyEngine::apply`].
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub manifest: ValidatedManifest,
    pub coordinate: ResourceCoordinate,
    pub field_manager: String,
    pub force_conflicts: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResult {
    pub resource: ResourceRef,
    pub coordinate: ResourceCoordinate,
    pub applied: serde_json::Value,
    pub http_status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    pub status: &'static str,
    pub http_status: u16,
}

impl ApplyResult {
    pub fn summary(&self) -> ApplySummary {
        ApplySummary {
            status: "applied",
            http_status: self.http_status,
        }
    }
}

/// Sends exactly one apply patch per call and classifies the answer.
///
/// Merge semantics are the server's: fields owned by other managers and
/// omitted here are kept, fields this manager owned and no longer sets are
/// removed. Nothing is retried.
#[derive(Clone)]
pub struct ApplyEngine {
    client: Arc<dyn ApiServerClient>,
    request_timeout: Duration,
}

impl ApplyEngine {
    pub fn new(client: Arc<dyn ApiServerClient>) -> Self {
        Self {
            client,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub async fn apply(
        &self,
        request: ApplyRequest,
        cancel: &CancellationToken,
    ) -> Result<ApplyResult, ApplyError> {
        let ApplyRequest {
            manifest,
            coordinate,
            field_manager,
            force_conflicts,
        } = request;
        let resource = manifest.resource_ref();

        let namespace = if coordinate.namespaced {
            match manifest.namespace() {
                Some(namespace) => Some(namespace),
                None => return Err(ApplyError::MissingNamespace { resource }),
            }
        } else {
            None
        };

        tracing::debug!(
            path = %coordinate.object_path(manifest.name(), namespace),
            field_manager = %field_manager,
            force = force_conflicts,
            "sending apply patch"
        );

        let patch = self.client.patch(
            &coordinate,
            manifest.name(),
            namespace,
            manifest.body(),
            &field_manager,
            force_conflicts,
        );

        match bounded(patch, self.request_timeout, cancel).await {
            Bounded::Completed(Ok(response)) => Ok(ApplyResult {
                resource,
                coordinate,
                applied: response.object,
                http_status: response.status,
            }),
            Bounded::Completed(Err(err)) => Err(classify(resource, err)),
            Bounded::TimedOut => Err(ApplyError::Timeout { resource }),
            Bounded::Cancelled => Err(ApplyError::Cancelled { resource }),
        }
    }
}

fn classify(resource: ResourceRef, err: ApiServerError) -> ApplyError {
    match err {
        ApiServerError::Status {
            code, conflicts, ..
        } if code == HTTP_CONFLICT && !conflicts.is_empty() => {
            ApplyError::Conflict { resource, conflicts }
        }
        ApiServerError::Status {
            code,
            message,
            body,
            ..
        } if code == HTTP_TOO_MANY_REQUESTS || code >= 500 => ApplyError::Transport {
            resource,
            status: Some(code),
            message,
            body,
        },
        ApiServerError::Status {
            code,
            reason,
            message,
            body,
            ..
        } => ApplyError::Rejected {
            resource,
            status: code,
            reason,
            message,
            body,
        },
        ApiServerError::Transport(message) => ApplyError::Transport {
            resource,
            status: None,
            message,
            body: None,
        },
    }
}

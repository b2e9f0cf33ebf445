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

use crate::domain::resource::coordinate::{GroupVersion, ResourceCoordinate};
use crate::infrastructure::kubernetes::discovery_cache::DiscoveryCache;
use crate::shared::error::{DiscoveryError, ResolutionError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Maps `apiVersion`/`kind` to a REST coordinate using discovery data only.
///
/// Plural names and scope always come from the server listing; a kind the
/// listing does not contain is unknown, never guessed.
#[derive(Clone)]
pub struct ResourceResolver {
    cache: Arc<DiscoveryCache>,
}

impl ResourceResolver {
    pub fn new(cache: Arc<DiscoveryCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }

    pub async fn resolve(
        &self,
        api_version: &str,
        kind: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceCoordinate, ResolutionError> {
        let group_version = GroupVersion::parse(api_version)?;

        let cached = self.cache.get(&group_version);
        if let Some(listing) = &cached {
            if let Some(coordinate) = listing.coordinate_for(&group_version, kind) {
                return Ok(coordinate);
            }
            tracing::debug!(%group_version, kind, "kind missing from cached listing");
        }

        let unknown = || ResolutionError::UnknownResourceType {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        };

        let refreshed = self
            .cache
            .refresh_since(&group_version, cached.as_ref(), cancel)
            .await;
        let listing = match refreshed {
            Ok(listing) => listing,
            Err(DiscoveryError::NotFound { .. }) => return Err(unknown()),
            Err(err) => return Err(err.into()),
        };

        listing
            .coordinate_for(&group_version, kind)
            .ok_or_else(unknown)
    }
}

/// Reject a caller-declared scope that disagrees with discovery.
pub fn ensure_scope(
    coordinate: &ResourceCoordinate,
    declared_namespaced: bool,
) -> Result<(), ResolutionError> {
    if coordinate.namespaced == declared_namespaced {
        Ok(())
    } else {
        Err(ResolutionError::NamespaceMismatch {
            kind: coordinate.kind.clone(),
            declared: declared_namespaced,
            actual: coordinate.namespaced,
        })
    }
}

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

use crate::shared::error::ResolutionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An API group and version. The core group is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// Split an `apiVersion` into group and version.
    ///
    /// `v1` is the core group, `apps/v1` is group `apps`. Anything else,
    /// including empty components, is malformed.
    pub fn parse(api_version: &str) -> Result<Self, ResolutionError> {
        let malformed = || ResolutionError::MalformedApiVersion(api_version.to_string());
        let parts: Vec<&str> = api_version.split('/').collect();
        match parts.as_slice() {
            [version] if !version.is_empty() => Ok(Self::new("", *version)),
            [group, version] if !group.is_empty() && !version.is_empty() => {
                Ok(Self::new(*group, *version))
            }
            _ => Err(malformed()),
        }
    }

    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }

    pub fn api_version(&self) -> String {
        if self.is_core() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_version())
    }
}

/// One resource type as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl DiscoveredResource {
    pub fn new(kind: impl Into<String>, plural: impl Into<String>, namespaced: bool) -> Self {
        Self {
            kind: kind.into(),
            plural: plural.into(),
            namespaced,
        }
    }
}

/// Ordered discovery listing for a single group version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceListing {
    resources: Vec<DiscoveredResource>,
}

impl ResourceListing {
    pub fn new(resources: Vec<DiscoveredResource>) -> Self {
        Self { resources }
    }

    pub fn resources(&self) -> &[DiscoveredResource] {
        &self.resources
    }

    /// Case-sensitive kind lookup; the first match wins.
    pub fn find_kind(&self, kind: &str) -> Option<&DiscoveredResource> {
        self.resources.iter().find(|resource| resource.kind == kind)
    }

    pub fn coordinate_for(
        &self,
        group_version: &GroupVersion,
        kind: &str,
    ) -> Option<ResourceCoordinate> {
        self.find_kind(kind).map(|resource| ResourceCoordinate {
            group: group_version.group.clone(),
            version: group_version.version.clone(),
            kind: resource.kind.clone(),
            plural: resource.plural.clone(),
            namespaced: resource.namespaced,
        })
    }
}

/// Where a resource type lives in the REST hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCoordinate {
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(rename = "resourcePluralName")]
    pub plural: String,
    pub namespaced: bool,
}

impl ResourceCoordinate {
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }

    pub fn api_version(&self) -> String {
        self.group_version().api_version()
    }

    /// REST path of a named object of this type.
    pub fn object_path(&self, name: &str, namespace: Option<&str>) -> String {
        let prefix = if self.group.is_empty() {
            format!("/api/{}", self.version)
        } else {
            format!("/apis/{}/{}", self.group, self.version)
        };
        match namespace {
            Some(namespace) if self.namespaced => {
                format!("{}/namespaces/{}/{}/{}", prefix, namespace, self.plural, name)
            }
            _ => format!("{}/{}/{}", prefix, self.plural, name),
        }
    }
}

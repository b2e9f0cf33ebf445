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

//! Manifest input: sources, decoding and validation

pub mod validator;

pub use validator::{validate, ValidatedManifest};

use crate::shared::error::{KubeError, ResourceRef, ValidationError};
use serde::Deserialize;
use std::path::PathBuf;

/// An untyped manifest tree, as decoded from YAML or JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    value: serde_json::Value,
}

impl Manifest {
    /// Wrap a decoded tree. The root must be an object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        if value.is_object() {
            Ok(Self { value })
        } else {
            Err(ValidationError::NotAnObject)
        }
    }

    /// Decode a single YAML (or JSON) document.
    pub fn decode(text: &str) -> Result<Self, KubeError> {
        let value: serde_json::Value = serde_yaml::from_str(text)?;
        Self::from_value(value)
            .map_err(|source| KubeError::validation(ResourceRef::default(), source))
    }

    /// Decode a `---` separated stream, skipping empty documents.
    ///
    /// A failure names the position of the offending document in the stream.
    pub fn decode_all(text: &str) -> Result<Vec<Self>, KubeError> {
        let mut manifests = Vec::new();
        for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
            let in_document = |source: KubeError| KubeError::Document {
                document: index + 1,
                source: Box::new(source),
            };
            let value = serde_json::Value::deserialize(document)
                .map_err(|e| in_document(KubeError::YamlParse(e)))?;
            if value.is_null() {
                continue;
            }
            let manifest = Self::from_value(value).map_err(|source| {
                in_document(KubeError::validation(ResourceRef::default(), source))
            })?;
            manifests.push(manifest);
        }
        Ok(manifests)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Best-effort identity, usable before validation.
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::from_value(&self.value)
    }
}

/// Where manifest text comes from: inline text or a file, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Inline(String),
    File(PathBuf),
}

impl std::fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestSource::Inline(_) => write!(f, "inline manifest"),
            ManifestSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl ManifestSource {
    /// Build a source from the two mutually exclusive inputs.
    ///
    /// Blank inline text and empty paths count as unset.
    pub fn from_inputs(
        inline: Option<String>,
        path: Option<PathBuf>,
    ) -> Result<Self, ValidationError> {
        let inline = inline.filter(|text| !text.trim().is_empty());
        let path = path.filter(|path| !path.as_os_str().is_empty());

        match (inline, path) {
            (Some(text), None) => Ok(Self::Inline(text)),
            (None, Some(path)) => Ok(Self::File(path)),
            (Some(_), Some(_)) => Err(ValidationError::ConflictingInputs(
                "inline manifest and manifest path are mutually exclusive".to_string(),
            )),
            (None, None) => Err(ValidationError::ConflictingInputs(
                "either an inline manifest or a manifest path is required".to_string(),
            )),
        }
    }

    pub async fn read(&self) -> Result<String, KubeError> {
        match self {
            ManifestSource::Inline(text) => Ok(text.clone()),
            ManifestSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                KubeError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to read manifest {}: {}", path.display(), e),
                ))
            }),
        }
    }
}

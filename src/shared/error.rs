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

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KubeError>;

/// Identity of the object an error is about.
///
/// Fields are best-effort: a manifest that failed validation may not have a
/// kind or a name yet, in which case they are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceRef {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: Option<impl Into<String>>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.map(Into::into),
        }
    }

    /// Extract whatever identity a raw manifest tree carries.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let text = |pointer: &str| {
            value
                .pointer(pointer)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let namespace = text("/metadata/namespace");
        Self {
            kind: text("/kind"),
            name: text("/metadata/name"),
            namespace: (!namespace.is_empty()).then_some(namespace),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.kind.is_empty() {
            "<unknown kind>"
        } else {
            &self.kind
        };
        let name = if self.name.is_empty() {
            "<unnamed>"
        } else {
            &self.name
        };
        match &self.namespace {
            Some(namespace) => write!(f, "{} {}/{}", kind, namespace, name),
            None => write!(f, "{} {}", kind, name),
        }
    }
}

/// A field another manager owns that this apply also sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldConflict {
    pub manager: String,
    pub field: String,
}

impl fmt::Display for FieldConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (owned by \"{}\")", self.field, self.manager)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("field `{0}` must not be set for a cluster-scoped resource")]
    UnexpectedField(&'static str),

    #[error("manifest document is not an object")]
    NotAnObject,

    #[error("conflicting manifest inputs: {0}")]
    ConflictingInputs(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("group version `{group_version}` is not served by the API server")]
    NotFound { group_version: String },

    #[error("discovery of `{group_version}` failed: {message}")]
    Transport {
        group_version: String,
        status: Option<u16>,
        message: String,
    },

    #[error("discovery of `{group_version}` timed out")]
    Timeout { group_version: String },

    #[error("discovery of `{group_version}` was cancelled")]
    Cancelled { group_version: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("malformed apiVersion `{0}`: expected `version` or `group/version`")]
    MalformedApiVersion(String),

    #[error("unknown resource type: kind `{kind}` is not served under `{api_version}`")]
    UnknownResourceType { api_version: String, kind: String },

    #[error(
        "namespace scope mismatch for kind `{kind}`: caller declared namespaced={declared}, server reports namespaced={actual}"
    )]
    NamespaceMismatch {
        kind: String,
        declared: bool,
        actual: bool,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("apply of {resource} conflicts with other field managers: {}", format_conflicts(.conflicts))]
    Conflict {
        resource: ResourceRef,
        conflicts: Vec<FieldConflict>,
    },

    #[error("apply of {resource} rejected by the API server ({status} {reason}): {message}")]
    Rejected {
        resource: ResourceRef,
        status: u16,
        reason: String,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("transport failure applying {resource}{}: {message}", format_status(.status))]
    Transport {
        resource: ResourceRef,
        status: Option<u16>,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("apply of {resource} timed out; its effect on the server is unknown")]
    Timeout { resource: ResourceRef },

    #[error("apply of {resource} was cancelled; its effect on the server is unknown")]
    Cancelled { resource: ResourceRef },

    #[error("{resource} targets a namespaced resource type but has no namespace")]
    MissingNamespace { resource: ResourceRef },
}

fn format_conflicts(conflicts: &[FieldConflict]) -> String {
    if conflicts.is_empty() {
        return "no field details reported".to_string();
    }
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_status(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" (HTTP {})", status))
        .unwrap_or_default()
}

impl ApplyError {
    pub fn resource(&self) -> &ResourceRef {
        match self {
            ApplyError::Conflict { resource, .. }
            | ApplyError::Rejected { resource, .. }
            | ApplyError::Transport { resource, .. }
            | ApplyError::Timeout { resource }
            | ApplyError::Cancelled { resource }
            | ApplyError::MissingNamespace { resource } => resource,
        }
    }

    /// Whether an invoking layer may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApplyError::Transport { .. } | ApplyError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum KubeError {
    #[error("Invalid manifest {resource}: {source}")]
    Validation {
        resource: ResourceRef,
        source: ValidationError,
    },

    #[error("Cannot resolve {resource}: {source}")]
    Resolution {
        resource: ResourceRef,
        source: ResolutionError,
    },

    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Failure decoding one document of a `---` separated stream, counted from 1.
    #[error("Document {document}: {source}")]
    Document {
        document: usize,
        source: Box<KubeError>,
    },

    #[error("Kubernetes client error: {0}")]
    KubeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for KubeError {
    fn from(err: kube::Error) -> Self {
        KubeError::KubeError(err.to_string())
    }
}

/// Structured form of a failure, for machine-readable output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl KubeError {
    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn validation(resource: ResourceRef, source: ValidationError) -> Self {
        Self::Validation { resource, source }
    }

    pub fn resolution(resource: ResourceRef, source: ResolutionError) -> Self {
        Self::Resolution { resource, source }
    }

    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            KubeError::Validation { resource, .. } | KubeError::Resolution { resource, .. } => {
                Some(resource)
            }
            KubeError::Apply(err) => Some(err.resource()),
            KubeError::Document { source, .. } => source.resource(),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            KubeError::Apply(err) => err.is_retryable(),
            KubeError::Resolution {
                source: ResolutionError::Discovery(DiscoveryError::Transport { .. }),
                ..
            }
            | KubeError::Resolution {
                source: ResolutionError::Discovery(DiscoveryError::Timeout { .. }),
                ..
            } => true,
            _ => false,
        }
    }

    /// Short machine-friendly name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            KubeError::Validation { source, .. } => match source {
                ValidationError::MissingField(_) => "MissingField",
                ValidationError::InvalidField { .. } => "InvalidField",
                ValidationError::UnexpectedField(_) => "UnexpectedField",
                ValidationError::NotAnObject => "NotAnObject",
                ValidationError::ConflictingInputs(_) => "ConflictingInputs",
            },
            KubeError::Resolution { source, .. } => match source {
                ResolutionError::MalformedApiVersion(_) => "MalformedApiVersion",
                ResolutionError::UnknownResourceType { .. } => "UnknownResourceType",
                ResolutionError::NamespaceMismatch { .. } => "NamespaceMismatch",
                ResolutionError::Discovery(_) => "DiscoveryFailed",
            },
            KubeError::Apply(err) => match err {
                ApplyError::Conflict { .. } => "Conflict",
                ApplyError::Rejected { .. } => "Rejected",
                ApplyError::Transport { .. } => "Transport",
                ApplyError::Timeout { .. } => "Timeout",
                ApplyError::Cancelled { .. } => "Cancelled",
                ApplyError::MissingNamespace { .. } => "MissingNamespace",
            },
            KubeError::Document { source, .. } => source.kind(),
            KubeError::KubeError(_) => "Client",
            KubeError::ConfigError(_) => "Config",
            KubeError::Io(_) => "Io",
            KubeError::YamlParse(_) => "YamlParse",
            KubeError::TomlParse(_) => "TomlParse",
            KubeError::JsonParse(_) => "JsonParse",
        }
    }

    pub fn report(&self) -> ErrorReport {
        let body = match self {
            KubeError::Apply(ApplyError::Conflict { conflicts, .. }) => {
                serde_json::to_value(conflicts).ok()
            }
            KubeError::Apply(ApplyError::Rejected {
                status,
                reason,
                body,
                ..
            }) => body
                .clone()
                .or_else(|| Some(serde_json::json!({ "code": status, "reason": reason }))),
            KubeError::Apply(ApplyError::Transport {
                status: Some(status),
                body,
                ..
            }) => body
                .clone()
                .or_else(|| Some(serde_json::json!({ "code": status }))),
            _ => None,
        };
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            resource: self.resource().cloned(),
            body,
        }
    }
}

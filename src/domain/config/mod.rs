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

//! Configuration domain

pub mod dynamic;

pub use self::dynamic::{apply_to_apply_config, parse_dynamic_configs};

use crate::infrastructure::constants::{
    CONFIG_FILE_ENV, DEFAULT_DISCOVERY_TTL_SECS, DEFAULT_FIELD_MANAGER,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRIES, MAX_FIELD_MANAGER_LEN,
};
use crate::shared::error::KubeError;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

/// Settings shared by every apply in one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Identity recorded as the owner of every field this tool sets.
    pub field_manager: String,
    pub force_conflicts: bool,
    pub discovery_ttl_secs: u64,
    pub request_timeout_secs: u64,
    /// Extra attempts after a retryable failure.
    pub retries: usize,
    /// Path to kubeconfig. Falls back to `KUBECONFIG` or `~/.kube/config`.
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            force_conflicts: false,
            discovery_ttl_secs: DEFAULT_DISCOVERY_TTL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            kubeconfig: None,
            context: None,
        }
    }
}

impl ApplyConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KubeError> {
        let path = path.as_ref();
        let content = read_to_string(path).map_err(|e| {
            KubeError::config_error(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let conf: Self = toml::from_str(&content)?;
        Ok(conf)
    }

    /// Load the file named by `path`, else by `KUBE_APPLY_CONFIG`, else defaults.
    pub fn load(path: Option<&str>) -> Result<Self, KubeError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var(CONFIG_FILE_ENV) {
            Ok(env_path) if !env_path.is_empty() => Self::from_file(env_path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), KubeError> {
        if self.field_manager.trim().is_empty() {
            return Err(KubeError::config_error("field_manager must not be empty"));
        }
        if self.field_manager.chars().count() > MAX_FIELD_MANAGER_LEN {
            return Err(KubeError::config_error(format!(
                "field_manager must be at most {} characters, got {}",
                MAX_FIELD_MANAGER_LEN,
                self.field_manager.chars().count()
            )));
        }
        if self.discovery_ttl_secs == 0 {
            return Err(KubeError::config_error("discovery_ttl_secs must be greater than 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(KubeError::config_error(
                "request_timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn discovery_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

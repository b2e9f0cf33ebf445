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

use crate::domain::config::ApplyConfig;
use crate::shared::error::KubeError;
use std::collections::HashMap;
use std::str::FromStr;

/// Parse dynamic configuration properties from -D key=value format
pub fn parse_dynamic_configs(configs: &[String]) -> Result<HashMap<String, String>, KubeError> {
    let mut map = HashMap::new();

    for config in configs {
        let parts: Vec<&str> = config.splitn(2, '=').collect();
        if parts.len() != 2 {
            return Err(KubeError::config_error(format!(
                "Invalid config format: '{}'. Expected 'key=value'",
                config
            )));
        }

        let key = parts[0].trim();
        let value = parts[1].trim();

        if key.is_empty() {
            return Err(KubeError::config_error(format!(
                "Empty key in config: '{}'",
                config
            )));
        }

        map.insert(key.to_string(), value.to_string());
    }

    Ok(map)
}

/// Overlay `-D` properties onto a loaded configuration.
pub fn apply_to_apply_config(
    configs: &HashMap<String, String>,
    config: &mut ApplyConfig,
) -> Result<(), KubeError> {
    for (key, value) in configs {
        match key.as_str() {
            "apply.field-manager" => config.field_manager = value.clone(),
            "apply.force-conflicts" => config.force_conflicts = parse_value(key, value)?,
            "apply.retries" => config.retries = parse_value(key, value)?,
            "discovery.ttl-secs" => config.discovery_ttl_secs = parse_value(key, value)?,
            "request.timeout-secs" => config.request_timeout_secs = parse_value(key, value)?,
            "kubernetes.context" => config.context = Some(value.clone()),
            "kubernetes.config.file" => config.kubeconfig = Some(value.clone()),
            _ => {
                return Err(KubeError::config_error(format!(
                    "Unknown config key: '{}'",
                    key
                )))
            }
        }
    }
    Ok(())
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, KubeError> {
    value.parse::<T>().map_err(|_| {
        KubeError::config_error(format!("Invalid value '{}' for config key '{}'", value, key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_dynamic_configs() {
        let map = parse_dynamic_configs(&props(&[
            "apply.field-manager = ci",
            "kubernetes.context=a=b",
        ]))
        .unwrap();
        assert_eq!(map.get("apply.field-manager").map(String::as_str), Some("ci"));
        assert_eq!(map.get("kubernetes.context").map(String::as_str), Some("a=b"));

        assert!(parse_dynamic_configs(&props(&["no-equals"])).is_err());
        assert!(parse_dynamic_configs(&props(&["=value"])).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let map = parse_dynamic_configs(&props(&[
            "apply.field-manager=ci",
            "apply.force-conflicts=true",
            "apply.retries=4",
            "discovery.ttl-secs=60",
            "request.timeout-secs=5",
            "kubernetes.context=prod",
            "kubernetes.config.file=/tmp/kubeconfig",
        ]))
        .unwrap();
        let mut config = ApplyConfig::default();
        apply_to_apply_config(&map, &mut config).unwrap();

        assert_eq!(
            config,
            ApplyConfig {
                field_manager: "ci".to_string(),
                force_conflicts: true,
                discovery_ttl_secs: 60,
                request_timeout_secs: 5,
                retries: 4,
                kubeconfig: Some("/tmp/kubeconfig".to_string()),
                context: Some("prod".to_string()),
            }
        );
    }

    #[test]
    fn test_unknown_key_and_bad_value() {
        let mut config = ApplyConfig::default();

        let unknown = parse_dynamic_configs(&props(&["apply.dry-run=true"])).unwrap();
        assert!(apply_to_apply_config(&unknown, &mut config).is_err());

        let bad = parse_dynamic_configs(&props(&["apply.retries=lots"])).unwrap();
        let err = apply_to_apply_config(&bad, &mut config).unwrap_err();
        assert!(err.to_string().contains("apply.retries"));
    }
}

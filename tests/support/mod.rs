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

//! In-memory API server with a reduced server-side apply ownership model.
//!
//! Every leaf of an applied body is a field owned by the applying manager.
//! A leaf owned by another manager with a different value is a conflict
//! unless the apply is forced, in which case ownership moves. Leaves a
//! manager stops sending are removed when nobody else owns them.

#![allow(dead_code)]

use kube_apply::domain::resource::{DiscoveredResource, GroupVersion, ResourceCoordinate};
use kube_apply::infrastructure::constants::{HTTP_CONFLICT, HTTP_CREATED, HTTP_OK};
use kube_apply::infrastructure::kubernetes::{ApiServerClient, ApiServerError, PatchResponse};
use kube_apply::shared::error::FieldConflict;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type FieldPath = Vec<String>;

#[derive(Debug, Clone, Default)]
struct StoredObject {
    object: Value,
    managers: BTreeMap<String, BTreeSet<FieldPath>>,
}

#[derive(Default)]
pub struct FakeApiServer {
    listings: Mutex<HashMap<GroupVersion, Vec<DiscoveredResource>>>,
    objects: Mutex<HashMap<String, StoredObject>>,
    discover_calls: Mutex<HashMap<GroupVersion, usize>>,
    patch_calls: AtomicUsize,
    discover_delay: Mutex<Duration>,
    failing_patches: Mutex<Vec<ApiServerError>>,
}

impl FakeApiServer {
    /// A server serving the usual built-in types.
    pub fn with_builtin_types() -> Self {
        let server = Self::default();
        server.serve(
            GroupVersion::new("", "v1"),
            vec![
                DiscoveredResource::new("ConfigMap", "configmaps", true),
                DiscoveredResource::new("Endpoints", "endpoints", true),
                DiscoveredResource::new("Namespace", "namespaces", false),
                DiscoveredResource::new("Service", "services", true),
            ],
        );
        server.serve(
            GroupVersion::new("apps", "v1"),
            vec![
                DiscoveredResource::new("Deployment", "deployments", true),
                DiscoveredResource::new("StatefulSet", "statefulsets", true),
            ],
        );
        server.serve(
            GroupVersion::new("rbac.authorization.k8s.io", "v1"),
            vec![
                DiscoveredResource::new("ClusterRole", "clusterroles", false),
                DiscoveredResource::new("Role", "roles", true),
            ],
        );
        server.serve(
            GroupVersion::new("networking.k8s.io", "v1"),
            vec![DiscoveredResource::new("NetworkPolicy", "networkpolicies", true)],
        );
        server
    }

    pub fn serve(&self, group_version: GroupVersion, resources: Vec<DiscoveredResource>) {
        self.listings.lock().insert(group_version, resources);
    }

    pub fn withdraw(&self, group_version: &GroupVersion) {
        self.listings.lock().remove(group_version);
    }

    pub fn set_discover_delay(&self, delay: Duration) {
        *self.discover_delay.lock() = delay;
    }

    /// Queue an error returned by the next patch instead of applying it.
    pub fn fail_next_patch(&self, err: ApiServerError) {
        self.failing_patches.lock().push(err);
    }

    pub fn discover_calls(&self, group_version: &GroupVersion) -> usize {
        self.discover_calls
            .lock()
            .get(group_version)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_discover_calls(&self) -> usize {
        self.discover_calls.lock().values().sum()
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    /// Stored object at a REST path, as `/api/v1/namespaces/default/configmaps/a`.
    pub fn object(&self, path: &str) -> Option<Value> {
        self.objects.lock().get(path).map(|stored| stored.object.clone())
    }

    /// Fields owned by `manager` on the object at `path`, dotted.
    pub fn owned_fields(&self, path: &str, manager: &str) -> Vec<String> {
        self.objects
            .lock()
            .get(path)
            .and_then(|stored| stored.managers.get(manager))
            .map(|fields| fields.iter().map(|field| dotted(field)).collect())
            .unwrap_or_default()
    }

    fn is_served(&self, coordinate: &ResourceCoordinate) -> bool {
        self.listings
            .lock()
            .get(&coordinate.group_version())
            .map(|resources| {
                resources
                    .iter()
                    .any(|r| r.plural == coordinate.plural && r.namespaced == coordinate.namespaced)
            })
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl ApiServerClient for FakeApiServer {
    async fn discover(
        &self,
        group_version: &GroupVersion,
    ) -> Result<Vec<DiscoveredResource>, ApiServerError> {
        *self
            .discover_calls
            .lock()
            .entry(group_version.clone())
            .or_default() += 1;

        let delay = *self.discover_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.listings
            .lock()
            .get(group_version)
            .cloned()
            .ok_or_else(|| ApiServerError::status(404, "NotFound", "no such group version"))
    }

    async fn patch(
        &self,
        coordinate: &ResourceCoordinate,
        name: &str,
        namespace: Option<&str>,
        body: &Value,
        field_manager: &str,
        force: bool,
    ) -> Result<PatchResponse, ApiServerError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.failing_patches.lock().pop() {
            return Err(err);
        }
        if !self.is_served(coordinate) {
            return Err(ApiServerError::status(
                404,
                "NotFound",
                "the server could not find the requested resource",
            ));
        }

        let path = coordinate.object_path(name, namespace);
        let mut objects = self.objects.lock();
        let created = !objects.contains_key(&path);
        let stored = objects.entry(path).or_default();

        let mut applied = BTreeMap::new();
        collect_leaves(body, &mut Vec::new(), &mut applied);

        let mut conflicts = Vec::new();
        for (manager, fields) in &stored.managers {
            if manager == field_manager {
                continue;
            }
            for field in fields {
                if let Some(value) = applied.get(field) {
                    if get_path(&stored.object, field) != Some(value) {
                        conflicts.push(FieldConflict {
                            manager: manager.clone(),
                            field: dotted(field),
                        });
                    }
                }
            }
        }

        if !conflicts.is_empty() && !force {
            let message = conflict_message(&conflicts);
            return Err(ApiServerError::Status {
                code: HTTP_CONFLICT,
                reason: "Conflict".to_string(),
                message,
                conflicts,
                body: None,
            });
        }

        // Forced fields move to this manager.
        for fields in stored
            .managers
            .iter_mut()
            .filter(|(manager, _)| manager.as_str() != field_manager)
            .map(|(_, fields)| fields)
        {
            for conflict in &conflicts {
                fields.retain(|field| dotted(field) != conflict.field);
            }
        }

        let previous = stored.managers.remove(field_manager).unwrap_or_default();
        for dropped in previous.iter().filter(|field| !applied.contains_key(*field)) {
            let shared = stored
                .managers
                .values()
                .any(|fields| fields.contains(dropped));
            if !shared {
                remove_path(&mut stored.object, dropped);
            }
        }

        if !stored.object.is_object() {
            stored.object = Value::Object(Map::new());
        }
        for (field, value) in &applied {
            set_path(&mut stored.object, field, value.clone());
        }
        set_path(
            &mut stored.object,
            &["apiVersion".to_string()],
            Value::String(coordinate.api_version()),
        );
        set_path(
            &mut stored.object,
            &["kind".to_string()],
            Value::String(coordinate.kind.clone()),
        );
        set_path(
            &mut stored.object,
            &["metadata".to_string(), "name".to_string()],
            Value::String(name.to_string()),
        );
        if let Some(namespace) = namespace {
            set_path(
                &mut stored.object,
                &["metadata".to_string(), "namespace".to_string()],
                Value::String(namespace.to_string()),
            );
        }

        stored
            .managers
            .insert(field_manager.to_string(), applied.into_keys().collect());
        stored.managers.retain(|_, fields| !fields.is_empty());

        Ok(PatchResponse {
            status: if created { HTTP_CREATED } else { HTTP_OK },
            object: stored.object.clone(),
        })
    }
}

fn is_identity(path: &[String]) -> bool {
    matches!(
        path.iter().map(String::as_str).collect::<Vec<_>>().as_slice(),
        ["apiVersion"] | ["kind"] | ["metadata", "name"] | ["metadata", "namespace"]
    )
}

fn collect_leaves(value: &Value, prefix: &mut FieldPath, out: &mut BTreeMap<FieldPath, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.clone());
                collect_leaves(child, prefix, out);
                prefix.pop();
            }
        }
        leaf => {
            if !prefix.is_empty() && !is_identity(prefix) {
                out.insert(prefix.clone(), leaf.clone());
            }
        }
    }
}

fn get_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

fn set_path(value: &mut Value, path: &[String], leaf: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = value;
    for key in parents {
        if !current.get(key).map(Value::is_object).unwrap_or(false) {
            current[key.as_str()] = Value::Object(Map::new());
        }
        current = &mut current[key.as_str()];
    }
    current[last.as_str()] = leaf;
}

fn remove_path(value: &mut Value, path: &[String]) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let Some(map) = value.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        map.remove(first);
        return;
    }
    if let Some(child) = map.get_mut(first) {
        remove_path(child, rest);
        if child.as_object().map(Map::is_empty).unwrap_or(false) {
            map.remove(first);
        }
    }
}

fn dotted(path: &[String]) -> String {
    path.iter().map(|segment| format!(".{}", segment)).collect()
}

fn conflict_message(conflicts: &[FieldConflict]) -> String {
    if let [conflict] = conflicts {
        return format!(
            "Apply failed with 1 conflict: conflict with \"{}\": {}",
            conflict.manager, conflict.field
        );
    }
    let mut message = format!("Apply failed with {} conflicts:", conflicts.len());
    for conflict in conflicts {
        message.push_str(&format!(
            " conflict with \"{}\": {}",
            conflict.manager, conflict.field
        ));
    }
    message
}

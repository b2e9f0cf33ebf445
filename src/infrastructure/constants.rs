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

/// Field manager recorded on applied objects when none is configured
pub const DEFAULT_FIELD_MANAGER: &str = "kube-apply";

/// The API server rejects longer field manager names
pub const MAX_FIELD_MANAGER_LEN: usize = 128;

/// Discovery cache
pub const DEFAULT_DISCOVERY_TTL_SECS: u64 = 600;

/// Upper bound for a single discovery or apply round trip
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Transport retries performed by the CLI layer
pub const DEFAULT_RETRIES: usize = 0;
pub const RETRY_MIN_DELAY_MILLIS: u64 = 200;
pub const RETRY_MAX_DELAY_SECS: u64 = 5;

/// Environment variable naming a config file
pub const CONFIG_FILE_ENV: &str = "KUBE_APPLY_CONFIG";

/// Manifest field paths
pub const FIELD_API_VERSION: &str = "apiVersion";
pub const FIELD_KIND: &str = "kind";
pub const FIELD_METADATA_NAME: &str = "metadata.name";
pub const FIELD_METADATA_NAMESPACE: &str = "metadata.namespace";

/// Status code reported for a successful apply
pub const HTTP_OK: u16 = 200;
pub const HTTP_CREATED: u16 = 201;
pub const HTTP_NOT_FOUND: u16 = 404;
pub const HTTP_CONFLICT: u16 = 409;
pub const HTTP_TOO_MANY_REQUESTS: u16 = 429;

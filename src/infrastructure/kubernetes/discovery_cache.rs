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

//! Time-bounded cache of discovery listings, keyed by group version.
//!
//! Concurrent refreshes of the same key are coalesced: the first caller
//! spawns a refresh task and every other caller awaits its shared output,
//! so the API server sees one discovery request per key at a time. The task
//! runs to completion even when every waiter has gone away.

use crate::domain::resource::{GroupVersion, ResourceListing};
use crate::infrastructure::constants::{
    DEFAULT_DISCOVERY_TTL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, HTTP_NOT_FOUND,
};
use crate::infrastructure::kubernetes::client::{ApiServerClient, ApiServerError};
use crate::shared::error::DiscoveryError;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type RefreshResult = Result<Arc<ResourceListing>, DiscoveryError>;
type RefreshFuture = Shared<BoxFuture<'static, RefreshResult>>;

/// Whether a caller may settle for a listing stored after it last looked.
enum Reuse<'a> {
    Never,
    UnlessSeen(Option<&'a Arc<ResourceListing>>),
}

struct CacheEntry {
    listing: Arc<ResourceListing>,
    refreshed_at: Instant,
}

pub struct DiscoveryCache {
    client: Arc<dyn ApiServerClient>,
    ttl: Duration,
    request_timeout: Duration,
    entries: Arc<RwLock<HashMap<GroupVersion, CacheEntry>>>,
    inflight: Arc<Mutex<HashMap<GroupVersion, RefreshFuture>>>,
}

impl DiscoveryCache {
    pub fn new(client: Arc<dyn ApiServerClient>) -> Self {
        Self {
            client,
            ttl: Duration::from_secs(DEFAULT_DISCOVERY_TTL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            entries: Arc::new(RwLock::new(HashMap::new())),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh listing for `group_version`, if any. Expired entries are evicted.
    pub fn get(&self, group_version: &GroupVersion) -> Option<Arc<ResourceListing>> {
        {
            let entries = self.entries.read();
            match entries.get(group_version) {
                None => return None,
                Some(entry) if entry.refreshed_at.elapsed() < self.ttl => {
                    return Some(Arc::clone(&entry.listing));
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries
            .get(group_version)
            .is_some_and(|entry| entry.refreshed_at.elapsed() >= self.ttl)
        {
            tracing::debug!(%group_version, "evicting expired discovery entry");
            entries.remove(group_version);
        }
        None
    }

    /// Fetch a new listing from the API server and store it.
    ///
    /// Joins a refresh of the same key that is already in flight. Cancelling
    /// stops this caller from waiting but leaves the shared refresh running
    /// for the others.
    pub async fn refresh(
        &self,
        group_version: &GroupVersion,
        cancel: &CancellationToken,
    ) -> RefreshResult {
        let refresh = self.inflight_refresh(group_version, Reuse::Never);
        await_refresh(group_version, refresh, cancel).await
    }

    /// Like [`refresh`](Self::refresh), but settles for a fresh listing that
    /// differs from `seen`, the listing the caller already found lacking.
    ///
    /// A caller that missed in [`get`](Self::get) while another refresh of
    /// the same key completed picks up that result instead of starting a
    /// second discovery request.
    pub async fn refresh_since(
        &self,
        group_version: &GroupVersion,
        seen: Option<&Arc<ResourceListing>>,
        cancel: &CancellationToken,
    ) -> RefreshResult {
        let refresh = self.inflight_refresh(group_version, Reuse::UnlessSeen(seen));
        await_refresh(group_version, refresh, cancel).await
    }

    pub fn invalidate(&self, group_version: &GroupVersion) {
        if self.entries.write().remove(group_version).is_some() {
            tracing::debug!(%group_version, "invalidated discovery entry");
        }
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn inflight_refresh(&self, group_version: &GroupVersion, reuse: Reuse<'_>) -> RefreshFuture {
        let mut inflight = self.inflight.lock();
        if let Some(existing) = inflight.get(group_version) {
            tracing::debug!(%group_version, "joining in-flight discovery refresh");
            return existing.clone();
        }

        // A refresh may have stored its result and left the in-flight map
        // between the caller's miss and this lock.
        if let Reuse::UnlessSeen(seen) = reuse {
            if let Some(listing) = self.fresh_listing(group_version) {
                if !seen.is_some_and(|seen| Arc::ptr_eq(seen, &listing)) {
                    tracing::debug!(%group_version, "using listing stored by a completed refresh");
                    return futures::future::ready(Ok(listing)).boxed().shared();
                }
            }
        }

        let task = tokio::spawn(run_refresh(
            Arc::clone(&self.client),
            Arc::clone(&self.entries),
            Arc::clone(&self.inflight),
            group_version.clone(),
            self.request_timeout,
        ));
        let key = group_version.clone();
        let refresh = task
            .map(move |joined| {
                joined.unwrap_or_else(|err| {
                    Err(DiscoveryError::Transport {
                        group_version: key.to_string(),
                        status: None,
                        message: format!("discovery task failed: {}", err),
                    })
                })
            })
            .boxed()
            .shared();
        inflight.insert(group_version.clone(), refresh.clone());
        refresh
    }

    fn fresh_listing(&self, group_version: &GroupVersion) -> Option<Arc<ResourceListing>> {
        self.entries
            .read()
            .get(group_version)
            .filter(|entry| entry.refreshed_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.listing))
    }
}

async fn await_refresh(
    group_version: &GroupVersion,
    refresh: RefreshFuture,
    cancel: &CancellationToken,
) -> RefreshResult {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DiscoveryError::Cancelled {
            group_version: group_version.to_string(),
        }),
        result = refresh => result,
    }
}

async fn run_refresh(
    client: Arc<dyn ApiServerClient>,
    entries: Arc<RwLock<HashMap<GroupVersion, CacheEntry>>>,
    inflight: Arc<Mutex<HashMap<GroupVersion, RefreshFuture>>>,
    group_version: GroupVersion,
    request_timeout: Duration,
) -> RefreshResult {
    tracing::debug!(%group_version, "refreshing discovery listing");

    let discover = client.discover(&group_version);
    let result = match tokio::time::timeout(request_timeout, discover).await {
        Ok(Ok(resources)) => Ok(Arc::new(ResourceListing::new(resources))),
        Ok(Err(err)) => Err(discovery_error(&group_version, err)),
        Err(_) => Err(DiscoveryError::Timeout {
            group_version: group_version.to_string(),
        }),
    };

    match &result {
        Ok(listing) => {
            entries.write().insert(
                group_version.clone(),
                CacheEntry {
                    listing: Arc::clone(listing),
                    refreshed_at: Instant::now(),
                },
            );
        }
        Err(err) => tracing::warn!(%group_version, error = %err, "discovery refresh failed"),
    }

    // Stored before removal, so a late caller either joins this future or
    // finds the fresh entry.
    inflight.lock().remove(&group_version);
    result
}

fn discovery_error(group_version: &GroupVersion, err: ApiServerError) -> DiscoveryError {
    match err {
        ApiServerError::Status { code, .. } if code == HTTP_NOT_FOUND => {
            DiscoveryError::NotFound {
                group_version: group_version.to_string(),
            }
        }
        ApiServerError::Status { code, message, .. } => DiscoveryError::Transport {
            group_version: group_version.to_string(),
            status: Some(code),
            message,
        },
        ApiServerError::Transport(message) => DiscoveryError::Transport {
            group_version: group_version.to_string(),
            status: None,
            message,
        },
    }
}

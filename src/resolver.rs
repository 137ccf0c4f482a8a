//! Cache-aside resolution of snapshots
//!
//! A read first checks the store and serves the cached document when one
//! exists. On a miss the snapshot is fetched from upstream, written back, and
//! returned. Cache hits are never revalidated; freshness comes from the
//! background refresher.
//!
//! Fetches are single-flight per username: concurrent misses and refresh
//! items for the same user share one upstream call and one write. Each fetch
//! runs on its own task, so a caller that gives up does not stall or cancel
//! it for the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{SnapshotStore, StoreError, Username};
use crate::snapshot::Snapshot;
use crate::upstream::{ProfileSource, UpstreamError};

/// Errors returned by `Resolver::resolve`
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Nothing was cached and upstream could not provide the snapshot
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The cached entry exists but could not be read
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of one fetch-and-write operation
#[derive(Debug, Clone)]
pub struct Fetched {
    /// The snapshot upstream returned
    pub snapshot: Snapshot,
    /// Set when the snapshot could not be written to the store
    pub persist_error: Option<Arc<StoreError>>,
}

pub type FetchOutcome = Result<Fetched, UpstreamError>;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct PendingFetch {
    id: u64,
    fetch: SharedFetch,
}

type InflightMap = Mutex<HashMap<Username, PendingFetch>>;

/// Serves snapshots from the store, fetching through on a miss
pub struct Resolver {
    store: Arc<SnapshotStore>,
    source: Arc<dyn ProfileSource>,
    /// Pending fetches keyed by username; each task removes its own entry
    inflight: Arc<InflightMap>,
    next_id: AtomicU64,
}

impl Resolver {
    pub fn new(store: Arc<SnapshotStore>, source: Arc<dyn ProfileSource>) -> Self {
        Self {
            store,
            source,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn ProfileSource> {
        &self.source
    }

    /// Returns the snapshot for `username`
    ///
    /// # Behavior
    /// - Cached entry present: returned as-is, upstream is not contacted
    /// - Cached entry missing, vanished or corrupt: fetched from upstream and
    ///   written back; a failed write is logged and the snapshot still returned
    /// - Upstream failure on a miss: `ResolveError::Upstream`, nothing written
    pub async fn resolve(&self, username: &Username) -> Result<Snapshot, ResolveError> {
        if self.store.exists(username).await {
            match self.store.read(username).await {
                Ok(snapshot) => {
                    debug!(%username, "serving cached snapshot");
                    return Ok(snapshot);
                }
                Err(err @ (StoreError::NotFound(_) | StoreError::Corrupt { .. })) => {
                    warn!(%username, error = %err, "cached snapshot unusable, fetching from upstream");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let fetched = self.fetch_and_store(username).await?;
        match &fetched.persist_error {
            Some(err) => warn!(%username, error = %err, "serving fetched snapshot that could not be cached"),
            None => info!(%username, "fetched and cached snapshot"),
        }
        Ok(fetched.snapshot)
    }

    /// Fetches `username` from upstream and writes the result to the store
    ///
    /// Skips the cache check. If a fetch for the same username is already
    /// running, waits for it instead of issuing another upstream call. The
    /// fetch and its write-back complete even if every waiter is dropped.
    pub async fn fetch_and_store(&self, username: &Username) -> FetchOutcome {
        let fetch = lock(&self.inflight)
            .entry(username.clone())
            .or_insert_with(|| self.start_fetch(username.clone()))
            .fetch
            .clone();

        fetch.await
    }

    /// Spawns the fetch task; must be called with the inflight lock held
    fn start_fetch(&self, username: Username) -> PendingFetch {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let store = Arc::clone(&self.store);
        let source = Arc::clone(&self.source);
        let inflight = Arc::clone(&self.inflight);
        let key = username.clone();

        let task = tokio::spawn(async move {
            let outcome = match source.fetch_profile(&username).await {
                Ok(snapshot) => {
                    let persist_error = store.write(&username, &snapshot).await.err().map(Arc::new);
                    Ok(Fetched {
                        snapshot,
                        persist_error,
                    })
                }
                Err(err) => Err(err),
            };

            forget(&inflight, &username, id);
            outcome
        });

        let inflight = Arc::clone(&self.inflight);
        let fetch = async move {
            task.await.unwrap_or_else(|err| {
                forget(&inflight, &key, id);
                Err(UpstreamError::Transport(format!("fetch task failed: {err}")))
            })
        }
        .boxed()
        .shared();

        PendingFetch { id, fetch }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        lock(&self.inflight).len()
    }
}

/// Removes the entry for `username` if it still belongs to fetch `id`
fn forget(inflight: &InflightMap, username: &Username, id: u64) {
    let mut inflight = lock(inflight);
    if inflight.get(username).is_some_and(|pending| pending.id == id) {
        inflight.remove(username);
    }
}

fn lock(inflight: &InflightMap) -> MutexGuard<'_, HashMap<Username, PendingFetch>> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}

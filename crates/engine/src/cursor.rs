//! Remote resource cursor: one page in view, latest request wins.
//!
//! Fetches run as spawned tasks and report back over an unbounded channel that the
//! owner drains on its own loop. A response is applied only when its descriptor is
//! still the latest one requested; anything older is counted and dropped.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use meshview_api::MeshSyncApi;
use meshview_core::{KindsQuery, ResourcePage, ResourceQuery};
use metrics::{counter, histogram};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::model::{CursorUpdate, FetchError};

/// What applying an update changed.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorEvent {
    PageLoaded { query: ResourceQuery },
    PageFailed { query: ResourceQuery, error: FetchError },
    KindsLoaded,
    Located { id: String, position: Option<u64> },
    Discarded,
}

/// How [`ResourceCursor::request`] satisfied a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requested {
    Spawned,
    /// An identical fetch is in flight; its response will be applied.
    Joined,
    /// The held page already answers the descriptor. No response will follow.
    Cached,
}

pub struct ResourceCursor {
    api: Arc<dyn MeshSyncApi>,
    tx: mpsc::UnboundedSender<CursorUpdate>,
    rx: mpsc::UnboundedReceiver<CursorUpdate>,
    latest: Option<ResourceQuery>,
    loaded: Option<ResourceQuery>,
    in_flight: FxHashSet<ResourceQuery>,
    page: ResourcePage,
    error: Option<FetchError>,
    kinds_latest: Option<KindsQuery>,
    kinds_cache: FxHashMap<KindsQuery, Vec<String>>,
    kinds_in_flight: FxHashSet<KindsQuery>,
    locate_seq: u64,
    locating: Option<u64>,
    stale: u64,
}

impl ResourceCursor {
    pub fn new(api: Arc<dyn MeshSyncApi>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            tx,
            rx,
            latest: None,
            loaded: None,
            in_flight: FxHashSet::default(),
            page: ResourcePage::default(),
            error: None,
            kinds_latest: None,
            kinds_cache: FxHashMap::default(),
            kinds_in_flight: FxHashSet::default(),
            locate_seq: 0,
            locating: None,
            stale: 0,
        }
    }

    pub fn page(&self) -> &ResourcePage { &self.page }
    pub fn error(&self) -> Option<&FetchError> { self.error.as_ref() }
    /// Descriptor of the page currently held, if any fetch succeeded.
    pub fn loaded(&self) -> Option<&ResourceQuery> { self.loaded.as_ref() }
    pub fn latest(&self) -> Option<&ResourceQuery> { self.latest.as_ref() }
    pub fn stale_discarded(&self) -> u64 { self.stale }

    pub fn busy(&self) -> bool {
        !self.in_flight.is_empty() || !self.kinds_in_flight.is_empty() || self.locating.is_some()
    }

    /// Whether the latest descriptor is still waiting for its response.
    pub fn is_loading(&self) -> bool {
        self.latest.as_ref().map_or(false, |q| self.in_flight.contains(q))
    }

    /// Make `query` the latest descriptor and fetch it unless an identical request
    /// is in flight or its page is already held.
    pub fn request(&mut self, query: ResourceQuery) -> Requested {
        self.request_kinds(query.kinds_query());
        self.latest = Some(query.clone());
        if self.in_flight.contains(&query) {
            debug!(page = query.page, "cursor: joined in-flight request");
            return Requested::Joined;
        }
        if self.loaded.as_ref() == Some(&query) && self.error.is_none() {
            debug!(page = query.page, "cursor: page already held");
            return Requested::Cached;
        }
        self.in_flight.insert(query.clone());
        info!(page = query.page, kind = %query.kind, search = %query.search, "cursor: fetch start");
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let t0 = Instant::now();
            let result = api.list_resources(query.clone()).await.map_err(FetchError::from);
            histogram!("meshview_fetch_ms", t0.elapsed().as_secs_f64() * 1000.0);
            counter!("meshview_fetch_total", 1u64);
            let _ = tx.send(CursorUpdate::Page { query, result });
        });
        Requested::Spawned
    }

    fn request_kinds(&mut self, query: KindsQuery) {
        if let Some(kinds) = self.kinds_cache.get(&query) {
            self.page.available_kinds = kinds.clone();
        }
        let cached = self.kinds_cache.contains_key(&query);
        self.kinds_latest = Some(query.clone());
        if cached || self.kinds_in_flight.contains(&query) {
            return;
        }
        self.kinds_in_flight.insert(query.clone());
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.list_kinds(query.clone()).await.map_err(FetchError::from);
            let _ = tx.send(CursorUpdate::Kinds { query, result });
        });
    }

    /// Find the absolute position of `id` under the filters of `query`. Supersedes
    /// any earlier lookup.
    pub fn locate(&mut self, query: &ResourceQuery, id: &str) -> u64 {
        self.locate_seq += 1;
        let seq = self.locate_seq;
        self.locating = Some(seq);
        let unpaged = query.unpaged();
        let id = id.to_string();
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        info!(id = %id, seq, "cursor: locate start");
        tokio::spawn(async move {
            let result = api
                .list_resources(unpaged)
                .await
                .map(|resp| resp.resources.iter().position(|r| r.id == id).map(|p| p as u64))
                .map_err(FetchError::from);
            let _ = tx.send(CursorUpdate::Located { seq, id, result });
        });
        seq
    }

    pub fn try_recv(&mut self) -> Option<CursorUpdate> { self.rx.try_recv().ok() }

    pub async fn recv(&mut self) -> Option<CursorUpdate> { self.rx.recv().await }

    pub fn apply(&mut self, update: CursorUpdate) -> CursorEvent {
        match update {
            CursorUpdate::Page { query, result } => {
                self.in_flight.remove(&query);
                if self.latest.as_ref() != Some(&query) {
                    self.stale += 1;
                    counter!("meshview_fetch_stale_total", 1u64);
                    debug!(page = query.page, kind = %query.kind, "cursor: stale response discarded");
                    return CursorEvent::Discarded;
                }
                match result {
                    Ok(resp) => {
                        info!(rows = resp.resources.len(), total = resp.total_count, "cursor: page applied");
                        let available_kinds = std::mem::take(&mut self.page.available_kinds);
                        self.page = ResourcePage { resources: resp.resources, total_count: resp.total_count, available_kinds };
                        self.loaded = Some(query.clone());
                        self.error = None;
                        CursorEvent::PageLoaded { query }
                    }
                    Err(error) => {
                        warn!(error = %error, "cursor: fetch failed");
                        self.error = Some(error.clone());
                        CursorEvent::PageFailed { query, error }
                    }
                }
            }
            CursorUpdate::Kinds { query, result } => {
                self.kinds_in_flight.remove(&query);
                match result {
                    Ok(resp) => {
                        let names = resp.kind_names();
                        if self.kinds_latest.as_ref() == Some(&query) {
                            self.page.available_kinds = names.clone();
                        }
                        self.kinds_cache.insert(query, names);
                        CursorEvent::KindsLoaded
                    }
                    Err(e) => {
                        warn!(error = %e, "cursor: kinds fetch failed");
                        CursorEvent::Discarded
                    }
                }
            }
            CursorUpdate::Located { seq, id, result } => {
                if self.locating != Some(seq) {
                    return CursorEvent::Discarded;
                }
                self.locating = None;
                match result {
                    Ok(position) => CursorEvent::Located { id, position },
                    Err(e) => {
                        warn!(id = %id, error = %e, "cursor: locate failed");
                        CursorEvent::Located { id, position: None }
                    }
                }
            }
        }
    }
}

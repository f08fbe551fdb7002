//! Meshview store: coalescing ingest, catalog snapshots and server-side paging.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use arc_swap::ArcSwap;
use meshview_core::columns::field_value;
use meshview_core::{Delta, DeltaKind, KindsQuery, PageSize, Resource, ResourceQuery, SortDirection};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Coalescing queue keyed by resource id with FIFO order and fixed capacity.
///
/// Every ingest path, a one-shot dump load included, goes through it: a dump
/// that repeats an id keeps only the last record for it, in first-seen order,
/// and a live delta feed gets the same last-write-wins treatment per flush.
/// When more distinct ids than `cap` are pending the oldest are dropped and
/// counted.
pub struct Coalescer {
    map: FxHashMap<String, Delta>,
    order: VecDeque<String>,
    cap: usize,
    dropped: u64,
}

impl Coalescer {
    pub fn with_capacity(cap: usize) -> Self {
        Self { map: FxHashMap::default(), order: VecDeque::new(), cap: cap.max(1), dropped: 0 }
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
    pub fn dropped(&self) -> u64 { self.dropped }

    pub fn push(&mut self, d: Delta) {
        if !self.map.contains_key(&d.id) {
            if self.order.len() >= self.cap {
                if let Some(old) = self.order.pop_front() {
                    self.map.remove(&old);
                    self.dropped += 1;
                }
            }
            self.order.push_back(d.id.clone());
        }
        self.map.insert(d.id.clone(), d);
    }

    pub fn drain_ready(&mut self) -> Vec<Delta> {
        let mut out = Vec::with_capacity(self.order.len());
        while let Some(id) = self.order.pop_front() {
            if let Some(d) = self.map.remove(&id) {
                out.push(d);
            }
        }
        out
    }
}

/// Immutable view of every known resource at one epoch.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub epoch: u64,
    pub items: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: String,
    pub count: u64,
}

impl CatalogSnapshot {
    pub fn from_items(items: Vec<Resource>) -> Self { Self { epoch: 1, items } }

    fn matches(r: &Resource, search: &str, kind: &str, clusters: &[String]) -> bool {
        if !kind.is_empty() && r.kind != kind {
            return false;
        }
        if !clusters.is_empty() && !clusters.iter().any(|c| c == &r.cluster_id) {
            return false;
        }
        if search.is_empty() {
            return true;
        }
        let hay = [
            r.metadata.name.as_str(),
            r.metadata.namespace.as_deref().unwrap_or(""),
            r.kind.as_str(),
            r.api_version.as_str(),
            r.model.as_str(),
            r.cluster_id.as_str(),
        ];
        hay.iter().any(|h| h.to_lowercase().contains(search))
    }

    /// Filtered + ordered rows, before pagination.
    fn ordered(&self, q: &ResourceQuery) -> Vec<&Resource> {
        let search = q.search.trim().to_lowercase();
        let mut rows: Vec<&Resource> = self
            .items
            .iter()
            .filter(|r| Self::matches(r, &search, &q.kind, &q.cluster_ids))
            .collect();
        match &q.order {
            Some(order) => {
                let key = order.column.as_str();
                rows.sort_by(|a, b| {
                    let ord = compare_field(a, b, key);
                    let ord = if order.direction == SortDirection::Desc { ord.reverse() } else { ord };
                    ord.then_with(|| a.id.cmp(&b.id))
                });
            }
            None => rows.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name).then_with(|| a.id.cmp(&b.id))),
        }
        rows
    }

    /// Answer a listing request: one page of rows and the total matching count.
    pub fn list(&self, q: &ResourceQuery) -> (Vec<Resource>, u64) {
        let rows = self.ordered(q);
        let total = rows.len() as u64;
        let page: Vec<Resource> = match q.page_size {
            PageSize::All => rows.into_iter().cloned().collect(),
            PageSize::Rows(n) => rows.into_iter().skip(q.page.saturating_mul(n)).take(n).cloned().collect(),
        };
        (page, total)
    }

    /// Distinct kinds among rows matching search and clusters.
    pub fn kinds(&self, q: &KindsQuery) -> Vec<KindCount> {
        let search = q.search.trim().to_lowercase();
        let mut counts: FxHashMap<&str, u64> = FxHashMap::default();
        for r in self.items.iter().filter(|r| Self::matches(r, &search, "", &q.cluster_ids)) {
            if r.kind.is_empty() {
                continue;
            }
            *counts.entry(r.kind.as_str()).or_default() += 1;
        }
        let mut out: Vec<KindCount> = counts.into_iter().map(|(k, c)| KindCount { kind: k.to_string(), count: c }).collect();
        out.sort_by(|a, b| a.kind.cmp(&b.kind));
        out
    }
}

fn compare_field(a: &Resource, b: &Resource, key: &str) -> Ordering {
    match key {
        "metadata.creationTimestamp" | "metadata.creation_timestamp" | "created_at" => {
            creation_ts(a).cmp(&creation_ts(b))
        }
        _ => field_value(a, key).cmp(&field_value(b, key)),
    }
}

fn creation_ts(r: &Resource) -> i64 {
    r.metadata
        .creation_timestamp
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

/// Builds catalog snapshots from deltas.
pub struct CatalogBuilder {
    epoch: u64,
    items: Vec<Resource>,
    index: FxHashMap<String, usize>,
}

impl Default for CatalogBuilder {
    fn default() -> Self { Self::new() }
}

impl CatalogBuilder {
    pub fn new() -> Self { Self { epoch: 0, items: Vec::new(), index: FxHashMap::default() } }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Apply a batch of deltas. Unparsable payloads are skipped with a warning.
    pub fn apply(&mut self, batch: Vec<Delta>) {
        for d in batch {
            match d.kind {
                DeltaKind::Applied => {
                    let mut r: Resource = match serde_json::from_value(d.raw) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(id = %d.id, error = %e, "catalog: skipping malformed resource");
                            continue;
                        }
                    };
                    if r.id.is_empty() {
                        r.id = d.id.clone();
                    }
                    match self.index.get(&d.id).copied() {
                        Some(idx) => self.items[idx] = r,
                        None => {
                            self.index.insert(d.id, self.items.len());
                            self.items.push(r);
                        }
                    }
                }
                DeltaKind::Deleted => {
                    if let Some(idx) = self.index.remove(&d.id) {
                        self.items.swap_remove(idx);
                        if let Some(moved) = self.items.get(idx) {
                            self.index.insert(moved.id.clone(), idx);
                        }
                    }
                }
            }
        }
        self.epoch = self.epoch.saturating_add(1);
    }

    pub fn freeze(&self) -> Arc<CatalogSnapshot> {
        Arc::new(CatalogSnapshot { epoch: self.epoch, items: self.items.clone() })
    }
}

/// Handle for readers to access the current snapshot and subscribe to swaps.
#[derive(Clone)]
pub struct CatalogHandle {
    snap: Arc<ArcSwap<CatalogSnapshot>>,
    epoch_rx: watch::Receiver<u64>,
}

impl CatalogHandle {
    /// Fixed handle over a prebuilt snapshot; never swaps.
    pub fn from_snapshot(snap: CatalogSnapshot) -> Self {
        let (_tx, epoch_rx) = watch::channel(snap.epoch);
        Self { snap: Arc::new(ArcSwap::from_pointee(snap)), epoch_rx }
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }
}

/// Spawn an ingest loop consuming deltas and swapping snapshots. Returns a sender for deltas,
/// a handle for reads and the loop's join handle (the loop exits once every sender is dropped).
pub fn spawn_ingest(cap: usize) -> (mpsc::Sender<Delta>, CatalogHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Delta>(cap.max(1));
    let snap = Arc::new(ArcSwap::from_pointee(CatalogSnapshot::default()));
    let (epoch_tx, epoch_rx) = watch::channel(0u64);
    let snap_clone = Arc::clone(&snap);

    let task = tokio::spawn(async move {
        let mut coalescer = Coalescer::with_capacity(cap);
        let mut builder = CatalogBuilder::new();
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(8));
        let publish = |coalescer: &mut Coalescer, builder: &mut CatalogBuilder| {
            let batch = coalescer.drain_ready();
            if batch.is_empty() {
                return;
            }
            builder.apply(batch);
            let next = builder.freeze();
            let epoch = next.epoch;
            metrics::gauge!("catalog_items", next.items.len() as f64);
            snap_clone.store(next);
            let _ = epoch_tx.send(epoch);
        };
        loop {
            tokio::select! {
                maybe = rx.recv() => {
                    match maybe {
                        Some(d) => coalescer.push(d),
                        None => {
                            debug!("delta channel closed; draining and exiting ingest loop");
                            publish(&mut coalescer, &mut builder);
                            break;
                        }
                    }
                }
                _ = ticker.tick() => publish(&mut coalescer, &mut builder),
            }
        }
        if coalescer.dropped() > 0 {
            warn!(dropped = coalescer.dropped(), "catalog: ingest queue overflowed");
        }
        info!(items = builder.len(), "ingest loop stopped");
    });

    (tx, CatalogHandle { snap, epoch_rx }, task)
}

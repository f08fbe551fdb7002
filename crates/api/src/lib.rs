//! Meshview API façade for the resource listing endpoints.
//!
//! This crate defines the stable trait and types the table engine depends on.
//! `InProcApi` answers from the in-RAM catalog; remote transports implement the same trait.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use meshview_core::{KindsQuery, PageSize, Resource, ResourceQuery};
use meshview_store::{CatalogHandle, CatalogSnapshot};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Listing response: one page of resources and the total matching count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceListResponse {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindEntry {
    #[serde(rename = "Kind", default)]
    pub kind: String,
    #[serde(rename = "Count", default)]
    pub count: u64,
}

/// Kind summary response used to populate the kind filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindsResponse {
    #[serde(default)]
    pub kinds: Vec<KindEntry>,
}

impl KindsResponse {
    /// Non-empty kind names in response order.
    pub fn kind_names(&self) -> Vec<String> {
        self.kinds.iter().filter(|k| !k.kind.is_empty()).map(|k| k.kind.clone()).collect()
    }
}

/// API errors suitable for transport over RPC.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ApiError {
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    /// Payload carried by the error, without the category prefix.
    pub fn details(&self) -> &str {
        match self {
            ApiError::Unavailable(s) | ApiError::Validation(s) | ApiError::NotFound(s) | ApiError::Internal(s) => s,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Remote resource listing surface consumed by the table engine.
#[async_trait::async_trait]
pub trait MeshSyncApi: Send + Sync {
    /// One page of resources under the query's filters and order.
    async fn list_resources(&self, query: ResourceQuery) -> ApiResult<ResourceListResponse>;

    /// Distinct kinds under the query's search and clusters, pagination ignored.
    async fn list_kinds(&self, query: KindsQuery) -> ApiResult<KindsResponse>;
}

fn validate(query: &ResourceQuery) -> ApiResult<()> {
    if query.page_size == PageSize::Rows(0) {
        return Err(ApiError::Validation("pagesize must be positive".into()));
    }
    Ok(())
}

fn kinds_response(snap: &CatalogSnapshot, query: &KindsQuery) -> KindsResponse {
    KindsResponse {
        kinds: snap.kinds(query).into_iter().map(|k| KindEntry { kind: k.kind, count: k.count }).collect(),
    }
}

// ----------------- In-process implementation -----------------

/// In-process implementation answering from the catalog's current snapshot.
pub struct InProcApi {
    catalog: CatalogHandle,
}

impl InProcApi {
    pub fn new(catalog: CatalogHandle) -> Self { Self { catalog } }
}

#[async_trait::async_trait]
impl MeshSyncApi for InProcApi {
    async fn list_resources(&self, query: ResourceQuery) -> ApiResult<ResourceListResponse> {
        let t0 = Instant::now();
        info!(page = query.page, kind = %query.kind, search = %query.search, "api: list_resources start");
        validate(&query)?;
        let snap = self.catalog.current();
        let (resources, total_count) = snap.list(&query);
        metrics::counter!("api_list_resources_total", 1u64);
        info!(rows = resources.len(), total_count, epoch = snap.epoch, took_ms = %t0.elapsed().as_millis(), "api: list_resources ok");
        Ok(ResourceListResponse { resources, total_count })
    }

    async fn list_kinds(&self, query: KindsQuery) -> ApiResult<KindsResponse> {
        let t0 = Instant::now();
        let snap = self.catalog.current();
        let resp = kinds_response(&snap, &query);
        info!(kinds = resp.kinds.len(), took_ms = %t0.elapsed().as_millis(), "api: list_kinds ok");
        Ok(resp)
    }
}

// ----------------- Mock implementation -----------------

/// In-memory mock for tests: real paging over a fixed snapshot, plus per-kind
/// artificial latency, injectable failures and call accounting.
pub struct MockApi {
    snapshot: CatalogSnapshot,
    latency_by_kind: HashMap<String, Duration>,
    default_latency: Duration,
    failure: Mutex<Option<ApiError>>,
    list_calls: AtomicUsize,
    kinds_calls: AtomicUsize,
    seen: Mutex<Vec<ResourceQuery>>,
}

impl MockApi {
    pub fn new(items: Vec<Resource>) -> Self {
        Self {
            snapshot: CatalogSnapshot::from_items(items),
            latency_by_kind: HashMap::new(),
            default_latency: Duration::ZERO,
            failure: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            kinds_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Delay listing responses whose kind filter equals `kind`.
    pub fn with_latency(mut self, kind: &str, latency: Duration) -> Self {
        self.latency_by_kind.insert(kind.to_string(), latency);
        self
    }

    pub fn with_default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Fail every listing request with `err` until cleared with `None`.
    pub fn set_failure(&self, err: Option<ApiError>) {
        if let Ok(mut f) = self.failure.lock() {
            *f = err;
        }
    }

    pub fn list_calls(&self) -> usize { self.list_calls.load(Ordering::SeqCst) }
    pub fn kinds_calls(&self) -> usize { self.kinds_calls.load(Ordering::SeqCst) }

    pub fn seen_queries(&self) -> Vec<ResourceQuery> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MeshSyncApi for MockApi {
    async fn list_resources(&self, query: ResourceQuery) -> ApiResult<ResourceListResponse> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(query.clone());
        }
        let delay = self.latency_by_kind.get(&query.kind).copied().unwrap_or(self.default_latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(err) = failure {
            return Err(err);
        }
        validate(&query)?;
        let (resources, total_count) = self.snapshot.list(&query);
        Ok(ResourceListResponse { resources, total_count })
    }

    async fn list_kinds(&self, query: KindsQuery) -> ApiResult<KindsResponse> {
        self.kinds_calls.fetch_add(1, Ordering::SeqCst);
        if !self.default_latency.is_zero() {
            tokio::time::sleep(self.default_latency).await;
        }
        Ok(kinds_response(&self.snapshot, &query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::Delta;
    use meshview_store::CatalogBuilder;
    use smallvec::SmallVec;

    fn res(id: &str, name: &str, kind: &str) -> Resource {
        let mut r = Resource::default();
        r.id = id.into();
        r.kind = kind.into();
        r.metadata.name = name.into();
        r
    }

    fn query(page: usize, size: usize, kind: &str) -> ResourceQuery {
        ResourceQuery {
            page,
            page_size: PageSize::Rows(size),
            search: String::new(),
            order: None,
            kind: kind.into(),
            cluster_ids: SmallVec::new(),
        }
    }

    #[test]
    fn responses_tolerate_missing_fields() {
        let resp: ResourceListResponse = serde_json::from_str("{}").expect("decode");
        assert!(resp.resources.is_empty());
        assert_eq!(resp.total_count, 0);
        let kinds: KindsResponse = serde_json::from_str(r#"{"kinds":[{"Kind":"Pod"},{"Kind":""},{}]}"#).expect("decode");
        assert_eq!(kinds.kind_names(), vec!["Pod".to_string()]);
    }

    #[test]
    fn error_details_strip_category() {
        let e = ApiError::Unavailable("connection refused".into());
        assert_eq!(e.to_string(), "unavailable: connection refused");
        assert_eq!(e.details(), "connection refused");
    }

    #[tokio::test]
    async fn in_proc_pages_the_catalog() {
        let mut b = CatalogBuilder::new();
        b.apply(
            (0..5)
                .map(|i| Delta {
                    id: format!("r{}", i),
                    kind: meshview_core::DeltaKind::Applied,
                    raw: serde_json::json!({ "id": format!("r{}", i), "kind": "Pod", "metadata": { "name": format!("n{}", i) } }),
                })
                .collect(),
        );
        let api = InProcApi::new(CatalogHandle::from_snapshot((*b.freeze()).clone()));
        let resp = api.list_resources(query(1, 2, "")).await.expect("list");
        assert_eq!(resp.total_count, 5);
        assert_eq!(resp.resources.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["r2", "r3"]);
        let kinds = api.list_kinds(query(0, 2, "").kinds_query()).await.expect("kinds");
        assert_eq!(kinds.kind_names(), vec!["Pod".to_string()]);
        let err = api.list_resources(query(0, 0, "")).await.expect_err("zero page size");
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn mock_counts_calls_and_injects_failures() {
        let api = MockApi::new(vec![res("a", "a", "Pod"), res("b", "b", "Service")]);
        let resp = api.list_resources(query(0, 10, "Service")).await.expect("list");
        assert_eq!(resp.total_count, 1);
        api.set_failure(Some(ApiError::Internal("boom".into())));
        assert!(api.list_resources(query(0, 10, "")).await.is_err());
        api.set_failure(None);
        assert!(api.list_resources(query(0, 10, "")).await.is_ok());
        assert_eq!(api.list_calls(), 3);
        assert_eq!(api.seen_queries()[0].kind, "Service");
    }
}

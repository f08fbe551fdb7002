#![forbid(unsafe_code)]

use meshview_core::{Delta, DeltaKind, KindsQuery, PageSize, ResourceQuery, SortOrder};
use meshview_store::{spawn_ingest, CatalogBuilder, CatalogSnapshot};
use smallvec::SmallVec;

fn raw(id: &str, name: &str, kind: &str, cluster: &str, ts: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "kind": kind,
        "apiVersion": "v1",
        "cluster_id": cluster,
        "metadata": { "name": name, "creationTimestamp": ts },
    })
}

fn applied(id: &str, name: &str, kind: &str, cluster: &str, ts: &str) -> Delta {
    Delta { id: id.into(), kind: DeltaKind::Applied, raw: raw(id, name, kind, cluster, ts) }
}

fn query(page: usize, size: usize) -> ResourceQuery {
    ResourceQuery {
        page,
        page_size: PageSize::Rows(size),
        search: String::new(),
        order: None,
        kind: String::new(),
        cluster_ids: SmallVec::new(),
    }
}

fn snapshot() -> std::sync::Arc<CatalogSnapshot> {
    let mut b = CatalogBuilder::new();
    b.apply(vec![
        applied("1", "delta", "Pod", "c1", "2024-01-04T00:00:00Z"),
        applied("2", "alpha", "Service", "c1", "2024-01-01T00:00:00Z"),
        applied("3", "charlie", "Pod", "c2", "2024-01-03T00:00:00Z"),
        applied("4", "bravo", "Deployment", "c2", "2024-01-02T00:00:00Z"),
        applied("5", "alpha", "Pod", "c1", "2024-01-05T00:00:00Z"),
    ]);
    b.freeze()
}

#[test]
fn default_order_is_name_then_id() {
    let snap = snapshot();
    let (rows, total) = snap.list(&query(0, 10));
    assert_eq!(total, 5);
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "5", "4", "3", "1"]);
}

#[test]
fn pagination_slices_and_reports_total() {
    let snap = snapshot();
    let (rows, total) = snap.list(&query(1, 2));
    assert_eq!(total, 5);
    assert_eq!(rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["4", "3"]);
    let (rows, _) = snap.list(&query(9, 2));
    assert!(rows.is_empty());
    let all = ResourceQuery { page_size: PageSize::All, ..query(3, 2) };
    assert_eq!(snap.list(&all).0.len(), 5);
}

#[test]
fn kind_search_and_cluster_filters() {
    let snap = snapshot();
    let pods = ResourceQuery { kind: "Pod".into(), ..query(0, 10) };
    assert_eq!(snap.list(&pods).1, 3);

    let search = ResourceQuery { search: "ALP".into(), ..query(0, 10) };
    assert_eq!(snap.list(&search).1, 2);

    let mut clusters = SmallVec::new();
    clusters.push("c2".to_string());
    let c2 = ResourceQuery { cluster_ids: clusters, ..query(0, 10) };
    let (rows, total) = snap.list(&c2);
    assert_eq!(total, 2);
    assert!(rows.iter().all(|r| r.cluster_id == "c2"));
}

#[test]
fn sorting_by_timestamp_and_wire_key() {
    let snap = snapshot();
    let newest_first = ResourceQuery { order: Some(SortOrder::desc("metadata.creationTimestamp")), ..query(0, 10) };
    let ids: Vec<String> = snap.list(&newest_first).0.into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["5", "1", "3", "4", "2"]);

    let by_kind = ResourceQuery { order: Some(SortOrder::asc("kind")), ..query(0, 10) };
    let kinds: Vec<String> = snap.list(&by_kind).0.into_iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec!["Deployment", "Pod", "Pod", "Pod", "Service"]);
}

#[test]
fn unpaged_listing_gives_absolute_positions() {
    let snap = snapshot();
    let position = |q: &ResourceQuery, id: &str| snap.list(&q.unpaged()).0.iter().position(|r| r.id == id);
    assert_eq!(position(&query(1, 2), "3"), Some(3));
    let pods = ResourceQuery { kind: "Pod".into(), ..query(1, 2) };
    assert_eq!(position(&pods, "3"), Some(1));
    assert_eq!(position(&pods, "2"), None);
}

#[test]
fn kind_summary_ignores_kind_filter() {
    let snap = snapshot();
    let q = KindsQuery { search: String::new(), order: None, cluster_ids: SmallVec::new() };
    let kinds = snap.kinds(&q);
    let names: Vec<&str> = kinds.iter().map(|k| k.kind.as_str()).collect();
    assert_eq!(names, vec!["Deployment", "Pod", "Service"]);
    assert_eq!(kinds[1].count, 3);
}

#[tokio::test]
async fn ingest_publishes_snapshot_on_close() {
    let (tx, handle, task) = spawn_ingest(16);
    for d in [applied("a", "a", "Pod", "c1", ""), applied("b", "b", "Pod", "c1", "")] {
        tx.send(d).await.expect("send");
    }
    tx.send(Delta { id: "a".into(), kind: DeltaKind::Deleted, raw: serde_json::json!({}) })
        .await
        .expect("send");
    drop(tx);
    task.await.expect("ingest loop");
    let snap = handle.current();
    assert!(snap.epoch >= 1);
    assert_eq!(snap.items.len(), 1);
    assert_eq!(snap.items[0].id, "b");
}

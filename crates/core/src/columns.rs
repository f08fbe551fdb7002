//! Column catalogue for the discovered-resources table.
//!
//! This module provides:
//! - Stable column keys + specs (labels, breakpoint class, sortability)
//! - Cell rendering helpers shared by every frontend
//! - Field access used by the in-process backend for ordering

#![forbid(unsafe_code)]

use std::borrow::Cow;

use crate::Resource;

/// Minimum viewport class at which a column is shown by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Breakpoint {
    Xs,
    S,
    M,
    L,
    Xl,
    /// Never shown unless the user turns it on.
    Na,
}

impl Breakpoint {
    /// Minimum viewport width in px; `None` means never by default.
    pub fn min_width(self) -> Option<u32> {
        match self {
            Breakpoint::Xs => Some(0),
            Breakpoint::S => Some(600),
            Breakpoint::M => Some(900),
            Breakpoint::L => Some(1200),
            Breakpoint::Xl => Some(1536),
            Breakpoint::Na => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub key: &'static str,
    pub label: &'static str,
    /// `None` for data-carrying columns that are never displayed.
    pub breakpoint: Option<Breakpoint>,
    pub sortable: bool,
    /// Listed in the column visibility picker.
    pub toggleable: bool,
}

// ---------------- Column keys (stable) ----------------
pub const COL_NAME: &str = "metadata.name";
pub const COL_API_VERSION: &str = "apiVersion";
pub const COL_KIND: &str = "kind";
pub const COL_MODEL: &str = "model";
pub const COL_CLUSTER_ID: &str = "cluster_id";
pub const COL_PATTERN_RESOURCES: &str = "pattern_resources";
pub const COL_DISCOVERED_AT: &str = "metadata.creationTimestamp";
pub const COL_STATUS: &str = "status";
pub const COL_COMPONENT_METADATA: &str = "component_metadata";
pub const COL_ID: &str = "id";
pub const COL_METADATA: &str = "metadata";

/// Names longer than this are cut and suffixed with `...`.
pub const NAME_MAX_CHARS: usize = 30;

fn col(key: &'static str, label: &'static str, bp: Breakpoint, sortable: bool) -> ColumnSpec {
    ColumnSpec { key, label, breakpoint: Some(bp), sortable, toggleable: true }
}

fn hidden(key: &'static str, label: &'static str) -> ColumnSpec {
    ColumnSpec { key, label, breakpoint: None, sortable: false, toggleable: false }
}

/// Full column set of the discovered-resources table, in display order.
pub fn meshsync_columns() -> Vec<ColumnSpec> {
    vec![
        col(COL_NAME, "Name", Breakpoint::Xs, false),
        col(COL_API_VERSION, "API version", Breakpoint::Na, true),
        col(COL_KIND, "Kind", Breakpoint::M, true),
        col(COL_MODEL, "Model", Breakpoint::M, true),
        col(COL_CLUSTER_ID, "Cluster ID", Breakpoint::Na, true),
        col(COL_PATTERN_RESOURCES, "Pattern resources", Breakpoint::Na, true),
        col(COL_DISCOVERED_AT, "Discovered At", Breakpoint::L, false),
        col(COL_STATUS, "Status", Breakpoint::Xs, false),
        hidden(COL_COMPONENT_METADATA, "Component Metadata"),
        hidden(COL_ID, "Resource ID"),
        col(COL_METADATA, "Metadata", Breakpoint::Na, false),
    ]
}

pub fn find_column<'a>(cols: &'a [ColumnSpec], key: &str) -> Option<&'a ColumnSpec> {
    cols.iter().find(|c| c.key == key)
}

/// Raw field value addressed by a column key. Accepts both display keys and
/// their snake_case wire form (`apiVersion` / `api_version`).
pub fn field_value<'a>(r: &'a Resource, key: &str) -> Cow<'a, str> {
    match key {
        "id" => Cow::Borrowed(&r.id),
        "name" | "metadata.name" => Cow::Borrowed(&r.metadata.name),
        "namespace" | "metadata.namespace" => Cow::Borrowed(r.metadata.namespace.as_deref().unwrap_or("")),
        "kind" => Cow::Borrowed(&r.kind),
        "apiVersion" | "api_version" => Cow::Borrowed(&r.api_version),
        "model" => Cow::Borrowed(&r.model),
        "cluster_id" | "clusterId" => Cow::Borrowed(&r.cluster_id),
        "pattern_resources" | "patternResources" => Cow::Borrowed(&r.pattern_resources),
        "metadata.creationTimestamp" | "metadata.creation_timestamp" | "created_at" => {
            Cow::Borrowed(r.metadata.creation_timestamp.as_deref().unwrap_or(""))
        }
        "status" => Cow::Borrowed(&r.status),
        "component_metadata" => Cow::Owned(serde_json::to_string(&r.component_metadata).unwrap_or_default()),
        "metadata" => Cow::Owned(serde_json::to_string(&r.metadata).unwrap_or_default()),
        _ => Cow::Borrowed(""),
    }
}

/// Display string for a cell, with the per-column formatting the table applies.
pub fn cell_text(r: &Resource, key: &str) -> String {
    match key {
        COL_NAME | COL_PATTERN_RESOURCES => truncate(&field_value(r, key), NAME_MAX_CHARS),
        COL_DISCOVERED_AT => format_discovered_at(r.metadata.creation_timestamp.as_deref()),
        COL_CLUSTER_ID => short_id(&r.cluster_id),
        _ => field_value(r, key).into_owned(),
    }
}

pub fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() > max_chars {
        let head: String = value.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

/// First UUID group of an id, the way ids are abbreviated in listings.
pub fn short_id(id: &str) -> String {
    match id.split_once('-') {
        Some((head, _)) if !head.is_empty() => head.to_string(),
        _ => id.to_string(),
    }
}

pub fn format_discovered_at(ts: Option<&str>) -> String {
    let Some(ts) = ts.filter(|s| !s.is_empty()) else { return "-".to_string() };
    match chrono::DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res() -> Resource {
        let mut r = Resource::default();
        r.id = "r-1".into();
        r.kind = "Deployment".into();
        r.api_version = "apps/v1".into();
        r.cluster_id = "2a1b9c1e-0d1f-4b1e-9f3a-1b2c3d4e5f60".into();
        r.metadata.name = "a-deployment-with-a-really-long-generated-name".into();
        r
    }

    #[test]
    fn catalogue_is_ordered_and_complete() {
        let cols = meshsync_columns();
        let keys: Vec<&str> = cols.iter().map(|c| c.key).collect();
        assert_eq!(keys.first(), Some(&COL_NAME));
        assert_eq!(keys.len(), 11);
        assert!(!find_column(&cols, COL_ID).expect("id").toggleable);
        assert!(find_column(&cols, COL_KIND).expect("kind").sortable);
        assert!(!find_column(&cols, COL_STATUS).expect("status").sortable);
    }

    #[test]
    fn names_are_truncated() {
        let r = res();
        let text = cell_text(&r, COL_NAME);
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), NAME_MAX_CHARS + 3);
        assert_eq!(truncate("short", NAME_MAX_CHARS), "short");
    }

    #[test]
    fn field_access_accepts_wire_keys() {
        let r = res();
        assert_eq!(field_value(&r, "api_version"), "apps/v1");
        assert_eq!(field_value(&r, "apiVersion"), "apps/v1");
        assert_eq!(field_value(&r, "unknown"), "");
        assert_eq!(cell_text(&r, COL_CLUSTER_ID), "2a1b9c1e");
    }

    #[test]
    fn discovered_at_formatting_is_lenient() {
        assert_eq!(format_discovered_at(None), "-");
        assert_eq!(format_discovered_at(Some("yesterday")), "yesterday");
        assert!(!format_discovered_at(Some("2024-01-02T03:04:05Z")).is_empty());
    }
}

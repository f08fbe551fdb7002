//! Meshview core types: discovered resources and the pages they are served in.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod columns;
pub mod query;
pub mod status;

pub use query::{KindsQuery, PageSize, ResourceQuery, SortDirection, SortOrder};
pub use status::{ConnectionState, MeshSyncChoice};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeltaKind {
    Applied,
    Deleted,
}

/// Change record emitted by a discovery agent for one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub id: String,
    pub kind: DeltaKind,
    /// Raw resource as reported upstream; shaped into [`Resource`] on ingest.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceMetadata {
    pub name: String,
    pub namespace: Option<String>,
    #[serde(rename = "creationTimestamp")]
    pub creation_timestamp: Option<String>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Capabilities {
    pub connection: bool,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComponentMetadata {
    pub capabilities: Capabilities,
    /// Either an embedded JSON object or a JSON document encoded as a string.
    pub metadata: serde_json::Value,
}

impl ComponentMetadata {
    /// Metadata as an object. String payloads are parsed; anything unparsable yields `{}`.
    pub fn parsed_metadata(&self) -> serde_json::Value {
        match &self.metadata {
            serde_json::Value::String(s) => serde_json::from_str::<serde_json::Value>(s)
                .ok()
                .filter(|v| v.is_object())
                .unwrap_or_else(|| serde_json::json!({})),
            serde_json::Value::Object(_) => self.metadata.clone(),
            _ => serde_json::json!({}),
        }
    }
}

/// A discovered infrastructure resource as served by the listing API.
///
/// Every field defaults when absent so partial payloads never fail to decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Resource {
    pub id: String,
    pub kind: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub model: String,
    pub cluster_id: String,
    pub pattern_resources: String,
    pub metadata: ResourceMetadata,
    pub component_metadata: ComponentMetadata,
    pub status: String,
}

impl Resource {
    pub fn name(&self) -> &str { &self.metadata.name }

    pub fn connection_capable(&self) -> bool { self.component_metadata.capabilities.connection }
}

/// One page of resources plus the filter-menu kinds; replaced wholesale on every fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePage {
    pub resources: Vec<Resource>,
    pub total_count: u64,
    pub available_kinds: Vec<String>,
}

impl ResourcePage {
    pub fn len(&self) -> usize { self.resources.len() }
    pub fn is_empty(&self) -> bool { self.resources.is_empty() }
    pub fn get(&self, index: usize) -> Option<&Resource> { self.resources.get(index) }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.id == id)
    }
}

pub mod prelude {
    pub use super::{
        Capabilities, ComponentMetadata, Delta, DeltaKind, Resource, ResourceMetadata, ResourcePage,
    };
    pub use super::query::{KindsQuery, PageSize, ResourceQuery, SortDirection, SortOrder};
}

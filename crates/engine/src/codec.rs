//! URL query codec: `tab` and `id` in, pass-through merge out.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Flat query parameter map as seen in the address bar.
pub type QueryMap = BTreeMap<String, String>;

pub const TAB_KEY: &str = "tab";
pub const ID_KEY: &str = "id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Connections,
    #[serde(rename = "meshsync")]
    MeshSync,
}

impl Tab {
    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Connections => "connections",
            Tab::MeshSync => "meshsync",
        }
    }

    /// Anything other than `meshsync` selects the connections tab.
    pub fn parse(s: &str) -> Tab {
        if s.trim().eq_ignore_ascii_case("meshsync") {
            Tab::MeshSync
        } else {
            Tab::Connections
        }
    }
}

/// The engine's slice of the query: which tab and which resource to deep-link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepLink {
    pub tab: Tab,
    pub id: Option<String>,
}

/// Never fails: absent or malformed parameters decode to the connections tab and no id.
/// The id is taken verbatim; only an empty one is dropped.
pub fn decode(query: &QueryMap) -> DeepLink {
    let tab = query.get(TAB_KEY).map(|t| Tab::parse(t)).unwrap_or_default();
    let id = query.get(ID_KEY).filter(|s| !s.is_empty()).cloned();
    DeepLink { tab, id }
}

/// Merge `{tab, id?}` into `base`, keeping every unrelated key. `id = None` removes it.
pub fn encode(base: &QueryMap, tab: Tab, id: Option<&str>) -> QueryMap {
    let mut out = base.clone();
    out.insert(TAB_KEY.to_string(), tab.as_str().to_string());
    match id.filter(|s| !s.is_empty()) {
        Some(id) => {
            out.insert(ID_KEY.to_string(), id.to_string());
        }
        None => {
            out.remove(ID_KEY);
        }
    }
    out
}

/// Parse `a=1&b=2` (leading `?` allowed). The first occurrence of a repeated key wins.
pub fn parse_query_string(s: &str) -> QueryMap {
    let s = s.trim().trim_start_matches('?');
    let mut out = QueryMap::new();
    for (k, v) in form_urlencoded::parse(s.as_bytes()) {
        if k.is_empty() {
            continue;
        }
        out.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    out
}

pub fn to_query_string(query: &QueryMap) -> String {
    form_urlencoded::Serializer::new(String::new()).extend_pairs(query.iter()).finish()
}

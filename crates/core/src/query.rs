//! Request descriptors for the resource listing and kind summary endpoints.

#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Asc),
            "desc" | "descending" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Single-column sort: the column key as shown in the table plus a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Asc }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Desc }
    }

    /// Wire form understood by the listing endpoint: `"<snake_column> <asc|desc>"`.
    pub fn to_wire(&self) -> String {
        format!("{} {}", camel_to_snake(&self.column), self.direction.as_str())
    }

    /// Parse `col`, `col asc`, `col:desc`. A bare column sorts ascending.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        let (col, dir) = match s.split_once(|c: char| c == ':' || c.is_whitespace()) {
            Some((c, d)) => (c.trim(), SortDirection::parse(d)?),
            None => (s, SortDirection::Asc),
        };
        if col.is_empty() {
            return None;
        }
        Some(Self { column: col.to_string(), direction: dir })
    }
}

/// `apiVersion` -> `api_version`, `metadata.creationTimestamp` -> `metadata.creation_timestamp`.
pub fn camel_to_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('.') && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rows per page. `All` is sent as the literal `"all"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSize {
    Rows(usize),
    All,
}

impl PageSize {
    pub fn rows(self) -> Option<usize> {
        match self {
            PageSize::Rows(n) => Some(n),
            PageSize::All => None,
        }
    }
}

impl Serialize for PageSize {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            PageSize::Rows(n) => s.serialize_u64(*n as u64),
            PageSize::All => s.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for PageSize {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(u64),
            Text(String),
        }
        match Repr::deserialize(d)? {
            Repr::Num(n) => Ok(PageSize::Rows(n as usize)),
            Repr::Text(t) if t.eq_ignore_ascii_case("all") => Ok(PageSize::All),
            Repr::Text(t) => t
                .trim()
                .parse::<usize>()
                .map(PageSize::Rows)
                .map_err(|_| serde::de::Error::custom(format!("invalid page size: {}", t))),
        }
    }
}

/// Listing request descriptor. Two equal descriptors denote the same network request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceQuery {
    pub page: usize,
    #[serde(rename = "pagesize")]
    pub page_size: PageSize,
    pub search: String,
    pub order: Option<SortOrder>,
    pub kind: String,
    #[serde(rename = "clusterIds")]
    pub cluster_ids: SmallVec<[String; 4]>,
}

impl ResourceQuery {
    /// Kind summary sharing this query's search, order and clusters.
    pub fn kinds_query(&self) -> KindsQuery {
        KindsQuery { search: self.search.clone(), order: self.order.clone(), cluster_ids: self.cluster_ids.clone() }
    }

    /// Same filters, first page, every row. Used to find the absolute position of a row.
    pub fn unpaged(&self) -> Self {
        Self { page: 0, page_size: PageSize::All, ..self.clone() }
    }
}

/// Kind summary request; pagination is always `"all"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KindsQuery {
    pub search: String,
    pub order: Option<SortOrder>,
    #[serde(rename = "clusterIds")]
    pub cluster_ids: SmallVec<[String; 4]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_per_segment() {
        assert_eq!(camel_to_snake("apiVersion"), "api_version");
        assert_eq!(camel_to_snake("metadata.creationTimestamp"), "metadata.creation_timestamp");
        assert_eq!(camel_to_snake("cluster_id"), "cluster_id");
        assert_eq!(camel_to_snake("kind"), "kind");
    }

    #[test]
    fn sort_wire_and_parse() {
        assert_eq!(SortOrder::desc("apiVersion").to_wire(), "api_version desc");
        assert_eq!(SortOrder::parse("kind"), Some(SortOrder::asc("kind")));
        assert_eq!(SortOrder::parse("kind:desc"), Some(SortOrder::desc("kind")));
        assert_eq!(SortOrder::parse("model descending"), Some(SortOrder::desc("model")));
        assert_eq!(SortOrder::parse("kind:sideways"), None);
        assert_eq!(SortOrder::parse("  "), None);
    }

    #[test]
    fn page_size_wire_form() {
        assert_eq!(serde_json::to_value(PageSize::All).unwrap(), serde_json::json!("all"));
        assert_eq!(serde_json::to_value(PageSize::Rows(25)).unwrap(), serde_json::json!(25));
        let p: PageSize = serde_json::from_value(serde_json::json!("10")).unwrap();
        assert_eq!(p, PageSize::Rows(10));
        let p: PageSize = serde_json::from_value(serde_json::json!("ALL")).unwrap();
        assert_eq!(p, PageSize::All);
        assert!(serde_json::from_value::<PageSize>(serde_json::json!("lots")).is_err());
    }

    #[test]
    fn kinds_query_ignores_pagination_and_kind() {
        let a = ResourceQuery {
            page: 3,
            page_size: PageSize::Rows(10),
            search: "nginx".into(),
            order: None,
            kind: "Pod".into(),
            cluster_ids: SmallVec::new(),
        };
        let b = ResourceQuery { page: 0, kind: "Service".into(), ..a.clone() };
        assert_eq!(a.kinds_query(), b.kinds_query());
        assert_eq!(a.unpaged().page_size, PageSize::All);
        assert_eq!(a.unpaged().page, 0);
    }
}

#![forbid(unsafe_code)]

use crate::codec::{decode, QueryMap, Tab, TAB_KEY};

/// Two-tab shell hosting the connections table and the discovered-resources table.
#[derive(Debug, Clone, Default)]
pub struct ConnectionsShell {
    tab: Tab,
}

impl ConnectionsShell {
    pub fn from_query(query: &QueryMap) -> Self { Self { tab: decode(query).tab } }

    pub fn tab(&self) -> Tab { self.tab }

    /// Follow external navigation. Returns whether the active tab changed.
    pub fn on_url_changed(&mut self, query: &QueryMap) -> bool {
        let tab = decode(query).tab;
        let changed = tab != self.tab;
        self.tab = tab;
        changed
    }

    /// Switch tabs; returns `current` with only `tab` rewritten.
    pub fn select_tab(&mut self, tab: Tab, current: &QueryMap) -> QueryMap {
        self.tab = tab;
        let mut out = current.clone();
        out.insert(TAB_KEY.to_string(), tab.as_str().to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_query_string;

    #[test]
    fn tab_follows_url_and_selection() {
        let mut shell = ConnectionsShell::from_query(&parse_query_string("tab=meshsync"));
        assert_eq!(shell.tab(), Tab::MeshSync);
        assert!(shell.on_url_changed(&parse_query_string("tab=connections")));
        assert!(!shell.on_url_changed(&parse_query_string("")));
        let q = shell.select_tab(Tab::MeshSync, &parse_query_string("id=r1&x=y"));
        assert_eq!(shell.tab(), Tab::MeshSync);
        assert_eq!(q.get("id").map(String::as_str), Some("r1"));
        assert_eq!(q.get("tab").map(String::as_str), Some("meshsync"));
    }
}

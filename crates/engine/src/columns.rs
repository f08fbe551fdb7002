#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use meshview_core::columns::ColumnSpec;

/// Breakpoint-derived visibility for a viewport width. Columns without a
/// breakpoint (or with `na`) are hidden.
pub fn resolve(specs: &[ColumnSpec], viewport_width: u32) -> BTreeMap<String, bool> {
    specs
        .iter()
        .map(|c| {
            let shown = c.breakpoint.and_then(|bp| bp.min_width()).map_or(false, |min| viewport_width >= min);
            (c.key.to_string(), shown)
        })
        .collect()
}

/// Breakpoint defaults plus explicit user toggles.
///
/// Overrides persist until the resolver is dropped (table remount); a width
/// change recomputes defaults but never clears an override.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    specs: Vec<ColumnSpec>,
    width: u32,
    overrides: BTreeMap<String, bool>,
}

impl ColumnResolver {
    pub fn new(specs: Vec<ColumnSpec>, viewport_width: u32) -> Self {
        Self { specs, width: viewport_width, overrides: BTreeMap::new() }
    }

    pub fn set_width(&mut self, width: u32) -> bool {
        let changed = self.width != width;
        self.width = width;
        changed
    }

    /// Record a user toggle. Unknown and non-toggleable columns are ignored.
    pub fn set_override(&mut self, key: &str, visible: bool) -> bool {
        match self.specs.iter().find(|c| c.key == key) {
            Some(spec) if spec.toggleable => {
                self.overrides.insert(key.to_string(), visible);
                true
            }
            _ => false,
        }
    }

    pub fn is_sortable(&self, key: &str) -> bool {
        self.specs.iter().any(|c| c.key == key && c.sortable)
    }

    pub fn resolved(&self) -> BTreeMap<String, bool> {
        let mut out = resolve(&self.specs, self.width);
        for (k, v) in &self.overrides {
            out.insert(k.clone(), *v);
        }
        out
    }

    /// Visible columns in display order.
    pub fn visible_specs(&self) -> Vec<ColumnSpec> {
        let vis = self.resolved();
        self.specs.iter().filter(|c| vis.get(c.key).copied().unwrap_or(false)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::columns::{meshsync_columns, COL_API_VERSION, COL_DISCOVERED_AT, COL_ID, COL_KIND, COL_NAME, COL_STATUS};

    #[test]
    fn narrow_viewport_shows_only_xs_columns() {
        let vis = resolve(&meshsync_columns(), 400);
        assert!(vis[COL_NAME]);
        assert!(vis[COL_STATUS]);
        assert!(!vis[COL_KIND]);
        assert!(!vis[COL_DISCOVERED_AT]);
        assert!(!vis[COL_ID]);
    }

    #[test]
    fn wide_viewport_still_hides_na_columns() {
        let vis = resolve(&meshsync_columns(), 1600);
        assert!(vis[COL_KIND]);
        assert!(vis[COL_DISCOVERED_AT]);
        assert!(!vis[COL_API_VERSION]);
    }

    #[test]
    fn overrides_survive_width_changes() {
        let mut r = ColumnResolver::new(meshsync_columns(), 1600);
        assert!(r.set_override(COL_KIND, false));
        assert!(r.set_override(COL_API_VERSION, true));
        assert!(!r.set_override(COL_ID, true));
        assert!(!r.set_override("nope", true));
        r.set_width(400);
        let vis = r.resolved();
        assert!(!vis[COL_KIND]);
        assert!(vis[COL_API_VERSION]);
        assert!(!vis[COL_ID]);
        let keys: Vec<&str> = r.visible_specs().iter().map(|c| c.key).collect();
        assert_eq!(keys, vec![COL_NAME, COL_API_VERSION, COL_STATUS]);
    }
}

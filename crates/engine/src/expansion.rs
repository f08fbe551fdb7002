//! Expansion synchronizer: reconciles the URL's deep-linked `id` with the single
//! expanded row.
//!
//! A pure reducer over `(phase, event)`. Every command it emits carries its
//! origin, so an expansion caused by the URL never writes the URL back, and the
//! echo of our own URL write is recognised and ignored.

#![forbid(unsafe_code)]

use std::time::Duration;

use meshview_core::ResourcePage;
use metrics::counter;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::view::Origin;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Waiting for the absolute position of a deep-linked id.
    Locating { id: String },
    /// Waiting for `page` to load; `resolved` once a position lookup already ran.
    AwaitingPage { id: String, page: usize, resolved: bool },
    ExpandedByUrl { id: String },
    ExpandedByUser { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    UrlChanged(Option<String>),
    /// The page for the current descriptor was replaced.
    PageLoaded,
    Located { id: String, position: Option<u64> },
    UserExpand(usize),
    UserCollapse,
    /// Search, kind or sort changed; remembered positions no longer hold.
    FiltersChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    SetPage(usize),
    Locate(String),
    Expand { index: usize, origin: Origin },
    Collapse { origin: Origin },
    /// Invalidation write: the expanded resource vanished from the page.
    WriteUrl(Option<String>),
    ScrollIntoView { resource_id: String, after: Duration },
}

/// Inputs read from the view store and cursor at the time of an event.
pub struct SyncContext<'a> {
    pub page: usize,
    pub page_size: usize,
    pub expanded: Option<usize>,
    pub rows: &'a ResourcePage,
    /// `rows` belong to the current descriptor (and so to `page`).
    pub rows_current: bool,
}

impl SyncContext<'_> {
    fn find(&self, id: &str) -> Option<usize> {
        if self.rows_current {
            self.rows.position_of(id)
        } else {
            None
        }
    }
}

pub struct ExpansionSync {
    phase: Phase,
    /// Last `id` the URL is known to carry, whether read or written by us.
    url_id: Option<String>,
    known_positions: FxHashMap<String, u64>,
    scroll_settle: Duration,
}

impl ExpansionSync {
    pub fn new(scroll_settle: Duration) -> Self {
        Self { phase: Phase::Idle, url_id: None, known_positions: FxHashMap::default(), scroll_settle }
    }

    pub fn phase(&self) -> &Phase { &self.phase }

    pub fn handle(&mut self, event: SyncEvent, ctx: &SyncContext<'_>) -> Vec<SyncCommand> {
        match event {
            SyncEvent::UrlChanged(id) => self.on_url(id, ctx),
            SyncEvent::PageLoaded => self.on_page(ctx),
            SyncEvent::Located { id, position } => self.on_located(id, position, ctx),
            SyncEvent::UserExpand(index) => {
                let Some(r) = ctx.rows.get(index) else { return Vec::new() };
                let id = r.id.clone();
                self.url_id = Some(id.clone());
                self.phase = Phase::ExpandedByUser { id };
                vec![SyncCommand::Expand { index, origin: Origin::User }]
            }
            SyncEvent::UserCollapse => {
                self.url_id = None;
                self.phase = Phase::Idle;
                vec![SyncCommand::Collapse { origin: Origin::User }]
            }
            SyncEvent::FiltersChanged => {
                self.known_positions.clear();
                let pending = match &self.phase {
                    Phase::Locating { id } | Phase::AwaitingPage { id, .. } => Some(id.clone()),
                    _ => None,
                };
                if let Some(id) = pending {
                    self.phase = Phase::AwaitingPage { id, page: 0, resolved: false };
                }
                Vec::new()
            }
        }
    }

    fn on_url(&mut self, id: Option<String>, ctx: &SyncContext<'_>) -> Vec<SyncCommand> {
        if id == self.url_id {
            return Vec::new();
        }
        self.url_id = id.clone();
        match id {
            None => {
                self.phase = Phase::Idle;
                if ctx.expanded.is_some() {
                    vec![SyncCommand::Collapse { origin: Origin::Url }]
                } else {
                    Vec::new()
                }
            }
            Some(id) => {
                let mut cmds = Vec::new();
                if ctx.expanded.is_some() && ctx.find(&id).is_none() {
                    cmds.push(SyncCommand::Collapse { origin: Origin::Url });
                }
                cmds.extend(self.resolve(id, ctx));
                cmds
            }
        }
    }

    fn resolve(&mut self, id: String, ctx: &SyncContext<'_>) -> Vec<SyncCommand> {
        if let Some(index) = ctx.find(&id) {
            return self.expand_from_url(id, index);
        }
        if let Some(pos) = self.known_positions.get(&id).copied() {
            return self.go_to(id, pos, ctx);
        }
        if ctx.rows_current {
            debug!(id = %id, "expansion: deep link not on current page");
            self.phase = Phase::Locating { id: id.clone() };
            vec![SyncCommand::Locate(id)]
        } else {
            self.phase = Phase::AwaitingPage { id, page: ctx.page, resolved: false };
            Vec::new()
        }
    }

    fn go_to(&mut self, id: String, position: u64, ctx: &SyncContext<'_>) -> Vec<SyncCommand> {
        let target = usize::try_from(position / ctx.page_size.max(1) as u64).unwrap_or(usize::MAX);
        if target != ctx.page {
            info!(id = %id, page = target, "expansion: moving to deep-linked page");
            self.phase = Phase::AwaitingPage { id, page: target, resolved: true };
            return vec![SyncCommand::SetPage(target)];
        }
        if let Some(index) = ctx.find(&id) {
            return self.expand_from_url(id, index);
        }
        if ctx.rows_current {
            self.give_up(&id);
            return Vec::new();
        }
        self.phase = Phase::AwaitingPage { id, page: target, resolved: true };
        Vec::new()
    }

    fn expand_from_url(&mut self, id: String, index: usize) -> Vec<SyncCommand> {
        counter!("meshview_deep_link_resolved_total", 1u64);
        info!(id = %id, index, "expansion: deep link expanded");
        self.phase = Phase::ExpandedByUrl { id: id.clone() };
        vec![
            SyncCommand::Expand { index, origin: Origin::Url },
            SyncCommand::ScrollIntoView { resource_id: id, after: self.scroll_settle },
        ]
    }

    fn give_up(&mut self, id: &str) {
        counter!("meshview_deep_link_not_found_total", 1u64);
        debug!(id = %id, "expansion: deep link not found");
        self.phase = Phase::Idle;
    }

    fn on_located(&mut self, id: String, position: Option<u64>, ctx: &SyncContext<'_>) -> Vec<SyncCommand> {
        match &self.phase {
            Phase::Locating { id: want } if *want == id => {}
            _ => return Vec::new(),
        }
        match position {
            Some(pos) => {
                self.known_positions.insert(id.clone(), pos);
                self.go_to(id, pos, ctx)
            }
            None => {
                self.give_up(&id);
                Vec::new()
            }
        }
    }

    fn on_page(&mut self, ctx: &SyncContext<'_>) -> Vec<SyncCommand> {
        if !ctx.rows_current {
            return Vec::new();
        }
        let base = (ctx.page as u64).saturating_mul(ctx.page_size as u64);
        for (i, r) in ctx.rows.resources.iter().enumerate() {
            self.known_positions.insert(r.id.clone(), base.saturating_add(i as u64));
        }
        match self.phase.clone() {
            Phase::AwaitingPage { id, page, resolved } => {
                if page != ctx.page {
                    return Vec::new();
                }
                if let Some(index) = ctx.find(&id) {
                    return self.expand_from_url(id, index);
                }
                if resolved {
                    self.give_up(&id);
                    Vec::new()
                } else {
                    self.phase = Phase::Locating { id: id.clone() };
                    vec![SyncCommand::Locate(id)]
                }
            }
            Phase::ExpandedByUrl { id } | Phase::ExpandedByUser { id } => match ctx.find(&id) {
                Some(index) if ctx.expanded == Some(index) => Vec::new(),
                Some(index) => vec![SyncCommand::Expand { index, origin: Origin::Url }],
                None => {
                    debug!(id = %id, "expansion: expanded resource left the page");
                    self.phase = Phase::Idle;
                    self.url_id = None;
                    vec![SyncCommand::Collapse { origin: Origin::Url }, SyncCommand::WriteUrl(None)]
                }
            },
            Phase::Idle | Phase::Locating { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::Resource;

    fn page(ids: &[&str]) -> ResourcePage {
        ResourcePage {
            resources: ids.iter().map(|id| Resource { id: id.to_string(), ..Default::default() }).collect(),
            total_count: 100,
            available_kinds: Vec::new(),
        }
    }

    fn ctx<'a>(rows: &'a ResourcePage, page_no: usize, expanded: Option<usize>) -> SyncContext<'a> {
        SyncContext { page: page_no, page_size: 10, expanded, rows, rows_current: true }
    }

    fn sync() -> ExpansionSync { ExpansionSync::new(Duration::from_millis(300)) }

    #[test]
    fn deep_link_on_current_page_expands_and_scrolls() {
        let rows = page(&["a", "b", "c"]);
        let mut s = sync();
        let cmds = s.handle(SyncEvent::UrlChanged(Some("b".into())), &ctx(&rows, 0, None));
        assert_eq!(
            cmds,
            vec![
                SyncCommand::Expand { index: 1, origin: Origin::Url },
                SyncCommand::ScrollIntoView { resource_id: "b".into(), after: Duration::from_millis(300) },
            ]
        );
        assert_eq!(s.phase(), &Phase::ExpandedByUrl { id: "b".into() });
    }

    #[test]
    fn deep_link_elsewhere_locates_then_pages() {
        let first = page(&["a", "b"]);
        let mut s = sync();
        let cmds = s.handle(SyncEvent::UrlChanged(Some("z".into())), &ctx(&first, 0, None));
        assert_eq!(cmds, vec![SyncCommand::Locate("z".into())]);
        let cmds = s.handle(SyncEvent::Located { id: "z".into(), position: Some(34) }, &ctx(&first, 0, None));
        assert_eq!(cmds, vec![SyncCommand::SetPage(3)]);
        let third = page(&["p0", "p1", "p2", "p3", "z"]);
        let cmds = s.handle(SyncEvent::PageLoaded, &ctx(&third, 3, None));
        assert_eq!(cmds[0], SyncCommand::Expand { index: 4, origin: Origin::Url });
    }

    #[test]
    fn missing_deep_link_soft_fails() {
        let rows = page(&["a"]);
        let mut s = sync();
        s.handle(SyncEvent::UrlChanged(Some("ghost".into())), &ctx(&rows, 0, None));
        let cmds = s.handle(SyncEvent::Located { id: "ghost".into(), position: None }, &ctx(&rows, 0, None));
        assert!(cmds.is_empty());
        assert_eq!(s.phase(), &Phase::Idle);
    }

    #[test]
    fn own_url_write_echo_is_quiescent() {
        let rows = page(&["a", "b"]);
        let mut s = sync();
        let cmds = s.handle(SyncEvent::UserExpand(1), &ctx(&rows, 0, None));
        assert_eq!(cmds, vec![SyncCommand::Expand { index: 1, origin: Origin::User }]);
        assert!(s.handle(SyncEvent::UrlChanged(Some("b".into())), &ctx(&rows, 0, Some(1))).is_empty());
        assert_eq!(s.phase(), &Phase::ExpandedByUser { id: "b".into() });
    }

    #[test]
    fn user_expand_cancels_pending_lookup() {
        let rows = page(&["a", "b"]);
        let mut s = sync();
        s.handle(SyncEvent::UrlChanged(Some("far".into())), &ctx(&rows, 0, None));
        s.handle(SyncEvent::UserExpand(0), &ctx(&rows, 0, None));
        let cmds = s.handle(SyncEvent::Located { id: "far".into(), position: Some(55) }, &ctx(&rows, 0, Some(0)));
        assert!(cmds.is_empty());
        assert_eq!(s.phase(), &Phase::ExpandedByUser { id: "a".into() });
    }

    #[test]
    fn vanished_row_collapses_and_clears_url() {
        let rows = page(&["a", "b"]);
        let mut s = sync();
        s.handle(SyncEvent::UserExpand(1), &ctx(&rows, 0, None));
        let next = page(&["c", "d"]);
        let cmds = s.handle(SyncEvent::PageLoaded, &ctx(&next, 1, Some(1)));
        assert_eq!(cmds, vec![SyncCommand::Collapse { origin: Origin::Url }, SyncCommand::WriteUrl(None)]);
        assert!(s.handle(SyncEvent::UrlChanged(None), &ctx(&next, 1, None)).is_empty());
    }

    #[test]
    fn moved_row_is_reindexed_without_url_write() {
        let rows = page(&["a", "b"]);
        let mut s = sync();
        s.handle(SyncEvent::UrlChanged(Some("b".into())), &ctx(&rows, 0, None));
        let shifted = page(&["x", "a", "b"]);
        let cmds = s.handle(SyncEvent::PageLoaded, &ctx(&shifted, 0, Some(1)));
        assert_eq!(cmds, vec![SyncCommand::Expand { index: 2, origin: Origin::Url }]);
    }

    #[test]
    fn far_page_load_does_not_overflow_positions() {
        let mut s = sync();
        let rows = page(&["a", "b"]);
        assert!(s.handle(SyncEvent::PageLoaded, &ctx(&rows, usize::MAX, None)).is_empty());
        let cmds = s.handle(SyncEvent::UrlChanged(Some("b".into())), &ctx(&rows, usize::MAX, None));
        assert_eq!(cmds[0], SyncCommand::Expand { index: 1, origin: Origin::Url });
    }

    #[test]
    fn remembered_positions_skip_lookup_until_filters_change() {
        let mut s = sync();
        let p2 = page(&["t0", "t1", "t2"]);
        s.handle(SyncEvent::PageLoaded, &ctx(&p2, 2, None));
        let p0 = page(&["a"]);
        let cmds = s.handle(SyncEvent::UrlChanged(Some("t2".into())), &ctx(&p0, 0, None));
        assert_eq!(cmds, vec![SyncCommand::SetPage(2)]);
        s.handle(SyncEvent::UserCollapse, &ctx(&p0, 0, None));
        s.handle(SyncEvent::FiltersChanged, &ctx(&p0, 0, None));
        let cmds = s.handle(SyncEvent::UrlChanged(Some("t2".into())), &ctx(&p0, 0, None));
        assert_eq!(cmds, vec![SyncCommand::Locate("t2".into())]);
    }
}

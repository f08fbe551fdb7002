//! View state store: the single writer of pagination, filters, sort, columns and expansion.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use meshview_core::{PageSize, ResourceQuery, SortDirection, SortOrder};
use smallvec::SmallVec;

use crate::columns::ColumnResolver;

/// Label of the kind filter entry that clears the filter.
pub const ALL_KINDS: &str = "All";

/// Who caused a state change. URL-originated changes never write the URL back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Url,
    User,
}

/// Side effects requested by a state change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub refetch: bool,
    pub url_write: bool,
}

impl Transition {
    pub const NONE: Transition = Transition { refetch: false, url_write: false };
    pub const REFETCH: Transition = Transition { refetch: true, url_write: false };
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub page: usize,
    pub page_size: usize,
    pub search: String,
    pub sort_order: Option<SortOrder>,
    /// Empty means every kind.
    pub selected_kind: String,
    /// Index into the currently loaded page.
    pub expanded: Option<usize>,
    pub column_visibility: BTreeMap<String, bool>,
}

pub struct ViewStore {
    state: ViewState,
    columns: ColumnResolver,
}

impl ViewStore {
    pub fn new(page_size: usize, columns: ColumnResolver) -> Self {
        let state = ViewState {
            page: 0,
            page_size: page_size.max(1),
            search: String::new(),
            sort_order: None,
            selected_kind: String::new(),
            expanded: None,
            column_visibility: columns.resolved(),
        };
        Self { state, columns }
    }

    pub fn state(&self) -> &ViewState { &self.state }
    pub fn columns(&self) -> &ColumnResolver { &self.columns }

    /// Listing descriptor for the current state.
    pub fn query(&self, cluster_ids: &SmallVec<[String; 4]>) -> ResourceQuery {
        ResourceQuery {
            page: self.state.page,
            page_size: PageSize::Rows(self.state.page_size),
            search: self.state.search.clone(),
            order: self.state.sort_order.clone(),
            kind: self.state.selected_kind.clone(),
            cluster_ids: cluster_ids.clone(),
        }
    }

    pub fn set_page(&mut self, page: usize) -> Transition {
        if self.state.page == page {
            return Transition::NONE;
        }
        self.state.page = page;
        Transition::REFETCH
    }

    pub fn set_page_size(&mut self, n: usize) -> Transition {
        let n = n.max(1);
        if self.state.page_size == n {
            return Transition::NONE;
        }
        self.state.page_size = n;
        Transition::REFETCH
    }

    pub fn set_search(&mut self, text: &str) -> Transition {
        self.state.search = text.to_string();
        self.state.page = 0;
        Transition::REFETCH
    }

    /// `All` (any case) and the empty string both clear the filter.
    pub fn set_selected_kind(&mut self, kind: &str) -> Transition {
        let kind = kind.trim();
        self.state.selected_kind = if kind.eq_ignore_ascii_case(ALL_KINDS) { String::new() } else { kind.to_string() };
        self.state.page = 0;
        Transition::REFETCH
    }

    pub fn set_sort_order(&mut self, order: Option<SortOrder>) -> Transition {
        self.state.sort_order = order;
        self.state.page = 0;
        Transition::REFETCH
    }

    /// Header click: ascending, then descending, then unsorted. A new column
    /// replaces the previous one. Non-sortable columns are ignored.
    pub fn toggle_sort(&mut self, column: &str) -> Transition {
        if !self.columns.is_sortable(column) {
            return Transition::NONE;
        }
        let next = match &self.state.sort_order {
            Some(o) if o.column == column => match o.direction {
                SortDirection::Asc => Some(SortOrder::desc(column)),
                SortDirection::Desc => None,
            },
            _ => Some(SortOrder::asc(column)),
        };
        self.set_sort_order(next)
    }

    pub fn set_column_visibility(&mut self, key: &str, visible: bool) -> Transition {
        if self.columns.set_override(key, visible) {
            self.state.column_visibility = self.columns.resolved();
        }
        Transition::NONE
    }

    pub fn set_viewport_width(&mut self, width: u32) -> Transition {
        if self.columns.set_width(width) {
            self.state.column_visibility = self.columns.resolved();
        }
        Transition::NONE
    }

    pub fn expand(&mut self, index: usize, origin: Origin) -> Transition {
        self.state.expanded = Some(index);
        Transition { refetch: false, url_write: origin == Origin::User }
    }

    pub fn collapse(&mut self, origin: Origin) -> Transition {
        self.state.expanded = None;
        Transition { refetch: false, url_write: origin == Origin::User }
    }

    /// Pull `page` back into range after a fetch reported `total`. Returns a
    /// refetch transition when the page moved.
    pub fn clamp_page(&mut self, total: u64) -> Transition {
        let size = self.state.page_size as u64;
        let start = (self.state.page as u64).saturating_mul(size);
        if self.state.page == 0 || start < total {
            return Transition::NONE;
        }
        let last = if total == 0 { 0 } else { (total - 1) / size };
        self.set_page(last as usize)
    }
}

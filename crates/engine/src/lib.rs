//! Meshview table engine.
//!
//! Keeps a paginated resource table consistent with the remote listing API, the
//! URL query and user interaction. Every operation returns [`Effect`]s for the
//! host to execute; the engine itself owns no UI handles.

#![forbid(unsafe_code)]

use std::sync::Arc;

use meshview_api::MeshSyncApi;
use meshview_core::columns::{meshsync_columns, ColumnSpec};
use meshview_core::{MeshSyncChoice, Resource, ResourcePage, ResourceQuery, SortOrder};
use smallvec::SmallVec;
use tracing::{debug, info};

pub mod codec;
pub mod columns;
pub mod config;
pub mod cursor;
pub mod expansion;
pub mod host;
pub mod model;
pub mod registration;
pub mod shell;
mod updates;
pub mod view;

pub use codec::{QueryMap, Tab};
pub use config::EngineConfig;
pub use expansion::Phase;
pub use host::{dispatch, Host};
pub use model::{Effect, EventType, FetchError, Notification};
pub use view::{Origin, ViewState, ALL_KINDS};

use columns::ColumnResolver;
use cursor::{Requested, ResourceCursor};
use expansion::{ExpansionSync, SyncCommand, SyncContext, SyncEvent};
use shell::ConnectionsShell;
use view::{Transition, ViewStore};

/// Cluster scope the table lists from, injected at mount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterContext {
    pub cluster_ids: SmallVec<[String; 4]>,
}

impl ClusterContext {
    pub fn new<I: IntoIterator<Item = String>>(ids: I) -> Self { Self { cluster_ids: ids.into_iter().collect() } }
}

pub struct TableEngine {
    context: ClusterContext,
    view: ViewStore,
    cursor: ResourceCursor,
    sync: ExpansionSync,
    shell: ConnectionsShell,
    url: QueryMap,
}

impl TableEngine {
    /// Mount the table: seed from the URL, start the first fetch, begin deep-link
    /// resolution. Requires a tokio runtime.
    pub fn mount(
        api: Arc<dyn MeshSyncApi>,
        context: ClusterContext,
        config: EngineConfig,
        url: QueryMap,
    ) -> (Self, Vec<Effect>) {
        let columns = ColumnResolver::new(meshsync_columns(), config.viewport_width);
        let mut engine = TableEngine {
            context,
            view: ViewStore::new(config.page_size, columns),
            cursor: ResourceCursor::new(api),
            sync: ExpansionSync::new(config.scroll_settle),
            shell: ConnectionsShell::from_query(&url),
            url,
        };
        info!(page_size = config.page_size, width = config.viewport_width, clusters = engine.context.cluster_ids.len(), "engine: mount");
        let mut effects = engine.fetch();
        let id = codec::decode(&engine.url).id;
        effects.extend(engine.feed(SyncEvent::UrlChanged(id)));
        (engine, effects)
    }

    // ----------------- accessors -----------------

    pub fn view(&self) -> &ViewState { self.view.state() }
    pub fn page(&self) -> &ResourcePage { self.cursor.page() }
    pub fn error(&self) -> Option<&FetchError> { self.cursor.error() }
    pub fn url(&self) -> &QueryMap { &self.url }
    pub fn tab(&self) -> Tab { self.shell.tab() }
    pub fn expansion_phase(&self) -> &Phase { self.sync.phase() }
    pub fn is_loading(&self) -> bool { self.cursor.is_loading() }
    /// Whether any fetch, kind summary or position lookup is outstanding.
    pub fn is_busy(&self) -> bool { self.cursor.busy() }
    pub fn stale_discarded(&self) -> u64 { self.cursor.stale_discarded() }

    pub fn query(&self) -> ResourceQuery { self.view.query(&self.context.cluster_ids) }

    pub fn visible_columns(&self) -> Vec<ColumnSpec> { self.view.columns().visible_specs() }

    pub fn expanded_resource(&self) -> Option<&Resource> {
        self.view.state().expanded.and_then(|i| self.cursor.page().get(i))
    }

    /// Kind filter menu: `All` followed by the available kinds.
    pub fn kind_options(&self) -> Vec<String> {
        std::iter::once(ALL_KINDS.to_string()).chain(self.cursor.page().available_kinds.iter().cloned()).collect()
    }

    // ----------------- view operations -----------------

    pub fn set_page(&mut self, page: usize) -> Vec<Effect> {
        let t = self.view.set_page(page);
        self.apply(t)
    }

    pub fn set_page_size(&mut self, n: usize) -> Vec<Effect> {
        let t = self.view.set_page_size(n);
        self.apply(t)
    }

    pub fn set_search(&mut self, text: &str) -> Vec<Effect> {
        let t = self.view.set_search(text);
        self.filters_changed(t)
    }

    pub fn set_selected_kind(&mut self, kind: &str) -> Vec<Effect> {
        let t = self.view.set_selected_kind(kind);
        self.filters_changed(t)
    }

    pub fn set_sort_order(&mut self, order: Option<SortOrder>) -> Vec<Effect> {
        let t = self.view.set_sort_order(order);
        self.filters_changed(t)
    }

    pub fn toggle_sort(&mut self, column: &str) -> Vec<Effect> {
        let t = self.view.toggle_sort(column);
        self.filters_changed(t)
    }

    pub fn set_column_visibility(&mut self, key: &str, visible: bool) {
        self.view.set_column_visibility(key, visible);
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        self.view.set_viewport_width(width);
    }

    pub fn expand_row(&mut self, index: usize) -> Vec<Effect> { self.feed(SyncEvent::UserExpand(index)) }

    pub fn collapse_row(&mut self) -> Vec<Effect> { self.feed(SyncEvent::UserCollapse) }

    /// External navigation (back/forward, pasted link, our own write echoed back).
    pub fn on_url_changed(&mut self, url: QueryMap) -> Vec<Effect> {
        if self.shell.on_url_changed(&url) {
            debug!(tab = self.shell.tab().as_str(), "engine: tab changed by url");
        }
        let id = codec::decode(&url).id;
        self.url = url;
        self.feed(SyncEvent::UrlChanged(id))
    }

    pub fn select_tab(&mut self, tab: Tab) -> Vec<Effect> {
        self.url = self.shell.select_tab(tab, &self.url);
        vec![Effect::ReplaceUrl(self.url.clone())]
    }

    /// Status selector on row `index` of the current page.
    pub fn select_connection_state(&mut self, index: usize, choice: MeshSyncChoice) -> Vec<Effect> {
        let Some(r) = self.cursor.page().get(index) else { return Vec::new() };
        match registration::select_state(r, choice) {
            Some(req) => {
                info!(id = %req.resource_id, choice = choice.as_str(), "engine: open registration");
                vec![Effect::OpenRegistration(req)]
            }
            None => Vec::new(),
        }
    }

    // ----------------- internals -----------------

    /// Request the current descriptor. A page that is already held counts as
    /// freshly loaded, since no response will arrive for it.
    fn fetch(&mut self) -> Vec<Effect> {
        let q = self.query();
        match self.cursor.request(q) {
            Requested::Cached => self.feed(SyncEvent::PageLoaded),
            Requested::Spawned | Requested::Joined => Vec::new(),
        }
    }

    fn apply(&mut self, t: Transition) -> Vec<Effect> {
        let mut effects = if t.refetch { self.fetch() } else { Vec::new() };
        if t.url_write {
            let id = self.expanded_resource().map(|r| r.id.clone());
            effects.push(self.write_url(id));
        }
        effects
    }

    fn filters_changed(&mut self, t: Transition) -> Vec<Effect> {
        let mut effects = self.feed(SyncEvent::FiltersChanged);
        effects.extend(self.apply(t));
        effects
    }

    fn write_url(&mut self, id: Option<String>) -> Effect {
        self.url = codec::encode(&self.url, Tab::MeshSync, id.as_deref());
        Effect::ReplaceUrl(self.url.clone())
    }

    fn feed(&mut self, event: SyncEvent) -> Vec<Effect> {
        let current = self.query();
        let state = self.view.state();
        let ctx = SyncContext {
            page: state.page,
            page_size: state.page_size,
            expanded: state.expanded,
            rows: self.cursor.page(),
            rows_current: self.cursor.loaded() == Some(&current),
        };
        let commands = self.sync.handle(event, &ctx);
        self.run(commands)
    }

    fn run(&mut self, commands: Vec<SyncCommand>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for cmd in commands {
            match cmd {
                SyncCommand::SetPage(p) => {
                    let t = self.view.set_page(p);
                    effects.extend(self.apply(t));
                }
                SyncCommand::Locate(id) => {
                    let q = self.query();
                    self.cursor.locate(&q, &id);
                }
                SyncCommand::Expand { index, origin } => {
                    let t = self.view.expand(index, origin);
                    effects.extend(self.apply(t));
                }
                SyncCommand::Collapse { origin } => {
                    let t = self.view.collapse(origin);
                    effects.extend(self.apply(t));
                }
                SyncCommand::WriteUrl(id) => effects.push(self.write_url(id)),
                SyncCommand::ScrollIntoView { resource_id, after } => {
                    effects.push(Effect::ScrollIntoView { resource_id, after })
                }
            }
        }
        effects
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use meshview_api::{InProcApi, MeshSyncApi};
use meshview_core::columns::{cell_text, ColumnSpec, COL_ID};
use meshview_core::{Delta, DeltaKind, KindsQuery, MeshSyncChoice, SortOrder};
use meshview_engine::codec::{parse_query_string, to_query_string, QueryMap};
use meshview_engine::registration::{state_choices, RegistrationRequest};
use meshview_engine::{dispatch, ClusterContext, Effect, EngineConfig, Host, Notification, TableEngine};
use meshview_store::spawn_ingest;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "meshctl", version, about = "Browse discovered mesh resources from a dump")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Resource dump: a JSON array or an object with a `resources` array
    #[arg(long = "data", env = "MESHVIEW_DATA")]
    data: PathBuf,

    /// Viewport width in px used for column breakpoints
    #[arg(long = "width", global = true)]
    width: Option<u32>,

    /// Rows per page
    #[arg(long = "page-size", global = true)]
    page_size: Option<usize>,

    /// Restrict listing to these cluster ids (repeatable)
    #[arg(long = "cluster", global = true)]
    clusters: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// List one page of resources
    Ls {
        /// Zero-based page index
        #[arg(long = "page", default_value_t = 0)]
        page: usize,
        /// Free-text filter
        #[arg(long = "search")]
        search: Option<String>,
        /// Kind filter; `All` clears it
        #[arg(long = "kind")]
        kind: Option<String>,
        /// Sort column, e.g. "kind" or "metadata.creationTimestamp:desc"
        #[arg(long = "sort")]
        sort: Option<String>,
        /// Force a column visible (repeatable)
        #[arg(long = "show")]
        show: Vec<String>,
        /// Force a column hidden (repeatable)
        #[arg(long = "hide")]
        hide: Vec<String>,
    },
    /// Summarise kinds with counts
    Kinds,
    /// Mount from a URL query (e.g. "tab=meshsync&id=...") and resolve the deep link
    Open {
        query: String,
    },
    /// Show the status choices of a resource and the registration it would open
    Register {
        id: String,
    },
}

fn init_tracing() {
    let env = std::env::var("MESHVIEW_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("MESHVIEW_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid MESHVIEW_METRICS_ADDR; expected host:port");
        }
    }
}

/// Load a dump into a fresh catalog and wait for the ingest loop to publish it.
async fn load_catalog(path: &Path) -> Result<InProcApi> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let items = match doc {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("resources") {
            Some(serde_json::Value::Array(items)) => items,
            _ => bail!("{}: expected a `resources` array", path.display()),
        },
        _ => bail!("{}: expected an array of resources", path.display()),
    };
    let cap = std::env::var("MESHVIEW_QUEUE_CAP").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(2048);
    let count = items.len();
    let (tx, handle, task) = spawn_ingest(cap.max(count));
    for (i, raw) in items.into_iter().enumerate() {
        let id = raw.get("id").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| format!("row-{}", i));
        tx.send(Delta { id, kind: DeltaKind::Applied, raw }).await.context("ingest loop stopped early")?;
    }
    drop(tx);
    task.await.context("ingest loop panicked")?;
    info!(items = count, epoch = handle.current().epoch, "catalog loaded");
    Ok(InProcApi::new(handle))
}

/// Host that prints what a browser would do.
#[derive(Default)]
struct ConsoleHost {
    registrations: Mutex<Vec<RegistrationRequest>>,
}

impl Host for ConsoleHost {
    fn replace_url(&self, query: &QueryMap) {
        debug!(url = %to_query_string(query), "host: replace url");
    }

    fn notify(&self, n: &Notification) {
        eprintln!("{:?}: {}", n.event_type, n.message);
    }

    fn update_progress(&self, show: bool) {
        debug!(show, "host: progress");
    }

    fn scroll_into_view(&self, resource_id: &str) {
        info!(id = %resource_id, "host: scrolled into view");
    }

    fn open_registration(&self, request: &RegistrationRequest) {
        if let Ok(mut r) = self.registrations.lock() {
            r.push(request.clone());
        }
    }
}

#[derive(Serialize)]
struct PageView {
    page: usize,
    page_size: usize,
    total_count: u64,
    kinds: Vec<String>,
    url: String,
    expanded: Option<String>,
    columns: Vec<&'static str>,
    rows: Vec<BTreeMap<&'static str, String>>,
}

fn page_view(engine: &TableEngine) -> PageView {
    let columns = engine.visible_columns();
    let rows = engine
        .page()
        .resources
        .iter()
        .map(|r| {
            let mut row: BTreeMap<&'static str, String> = columns.iter().map(|c| (c.key, cell_text(r, c.key))).collect();
            row.insert(COL_ID, r.id.clone());
            row
        })
        .collect();
    PageView {
        page: engine.view().page,
        page_size: engine.view().page_size,
        total_count: engine.page().total_count,
        kinds: engine.kind_options(),
        url: to_query_string(engine.url()),
        expanded: engine.expanded_resource().map(|r| r.id.clone()),
        columns: columns.iter().map(|c| c.key).collect(),
        rows,
    }
}

fn print_table(engine: &TableEngine) {
    let cols: Vec<ColumnSpec> = engine.visible_columns();
    let body: Vec<Vec<String>> =
        engine.page().resources.iter().map(|r| cols.iter().map(|c| cell_text(r, c.key)).collect()).collect();
    let widths: Vec<usize> = cols
        .iter()
        .enumerate()
        .map(|(i, c)| body.iter().map(|row| row[i].chars().count()).chain([c.label.len()]).max().unwrap_or(0))
        .collect();
    let header: Vec<String> = cols.iter().zip(&widths).map(|(c, w)| format!("{:<w$}", c.label, w = *w)).collect();
    println!("  {}", header.join("  "));
    let expanded = engine.view().expanded;
    for (i, row) in body.iter().enumerate() {
        let mark = if expanded == Some(i) { '>' } else { ' ' };
        let cells: Vec<String> = row.iter().zip(&widths).map(|(v, w)| format!("{:<w$}", v, w = *w)).collect();
        println!("{} {}", mark, cells.join("  "));
    }
    let v = engine.view();
    let pages = (engine.page().total_count as usize).div_ceil(v.page_size).max(1);
    println!("page {}/{} • {} total • kinds: {}", v.page + 1, pages, engine.page().total_count, engine.kind_options().join(", "));
    println!("url: ?{}", to_query_string(engine.url()));
}

fn emit(output: Output, engine: &TableEngine) -> Result<()> {
    match output {
        Output::Human => print_table(engine),
        Output::Json => println!("{}", serde_json::to_string_pretty(&page_view(engine))?),
    }
    Ok(())
}

async fn run_effects(host: &Arc<dyn Host>, effects: Vec<Effect>) {
    for task in dispatch(host, effects) {
        if let Err(e) = task.await {
            warn!(error = %e, "scroll task failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let api = Arc::new(load_catalog(&cli.data).await?);
    let mut config = EngineConfig::from_env();
    if let Some(w) = cli.width {
        config = config.with_viewport_width(w);
    }
    if let Some(n) = cli.page_size {
        config = config.with_page_size(n);
    }
    let context = ClusterContext::new(cli.clusters.clone());
    let console = Arc::new(ConsoleHost::default());
    let host: Arc<dyn Host> = console.clone();

    match cli.command {
        Commands::Ls { page, search, kind, sort, show, hide } => {
            info!(page, search = ?search, kind = ?kind, sort = ?sort, "ls invoked");
            let (mut engine, mut effects) =
                TableEngine::mount(api, context, config, parse_query_string("tab=meshsync"));
            if let Some(s) = search {
                effects.extend(engine.set_search(&s));
            }
            if let Some(k) = kind {
                effects.extend(engine.set_selected_kind(&k));
            }
            if let Some(s) = sort {
                let Some(order) = SortOrder::parse(&s) else { bail!("invalid sort: {}", s) };
                effects.extend(engine.set_sort_order(Some(order)));
            }
            for key in show {
                engine.set_column_visibility(&key, true);
            }
            for key in hide {
                engine.set_column_visibility(&key, false);
            }
            effects.extend(engine.settle().await);
            if page > 0 {
                effects.extend(engine.set_page(page));
                effects.extend(engine.settle().await);
            }
            run_effects(&host, effects).await;
            emit(cli.output, &engine)?;
        }
        Commands::Kinds => {
            let query = KindsQuery { search: String::new(), order: None, cluster_ids: context.cluster_ids.clone() };
            let resp = api.list_kinds(query).await.context("kind summary")?;
            match cli.output {
                Output::Human => {
                    for k in &resp.kinds {
                        println!("{:<24} {}", k.kind, k.count);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&resp)?),
            }
        }
        Commands::Open { query } => {
            let url = parse_query_string(&query);
            info!(url = %to_query_string(&url), "open invoked");
            let (mut engine, mut effects) = TableEngine::mount(api, context, config, url);
            effects.extend(engine.settle().await);
            run_effects(&host, effects).await;
            emit(cli.output, &engine)?;
            if cli.output == Output::Human {
                match engine.expanded_resource() {
                    Some(r) => println!("expanded: {} ({}) at row {}", r.id, r.name(), engine.view().expanded.unwrap_or(0)),
                    None => println!("expanded: -"),
                }
            }
        }
        Commands::Register { id } => {
            let url = parse_query_string(&format!("tab=meshsync&id={}", id));
            let (mut engine, mut effects) = TableEngine::mount(api, context, config, url);
            effects.extend(engine.settle().await);
            run_effects(&host, effects).await;
            let (Some(index), Some(row)) = (engine.view().expanded, engine.expanded_resource().cloned()) else {
                bail!("resource {} not found", id);
            };
            let choices = state_choices(&row);
            run_effects(&host, engine.select_connection_state(index, MeshSyncChoice::Register)).await;
            let request = console.registrations.lock().ok().and_then(|r| r.last().cloned());
            match cli.output {
                Output::Human => {
                    println!("{} ({}) status={}", row.id, row.name(), if row.status.is_empty() { "-" } else { row.status.as_str() });
                    for c in &choices {
                        println!("  {:<12}{}", c.choice.as_str(), if c.disabled { " (disabled)" } else { "" });
                    }
                    match &request {
                        Some(req) => println!("register -> {}", serde_json::to_string(req)?),
                        None => println!("register -> not eligible"),
                    }
                }
                Output::Json => {
                    #[derive(Serialize)]
                    struct Out<'a> {
                        id: &'a str,
                        choices: Vec<(&'static str, bool)>,
                        request: Option<RegistrationRequest>,
                    }
                    let out = Out {
                        id: &row.id,
                        choices: choices.iter().map(|c| (c.choice.as_str(), c.disabled)).collect(),
                        request,
                    };
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }
    }
    Ok(())
}

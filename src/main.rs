//! livingreview - living literature review on AI and the labor market
//!
//! Queries CrossRef, Semantic Scholar and OpenAlex, keeps the relevant records
//! and maintains a scored, categorized collection on disk.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! livingreview refresh
//! livingreview list --sort citations --limit 20
//! livingreview export --format ris --output review.ris
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! livingreview serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use livingreview::{
    collection::{Collection, RecordFilter, SortKey},
    config::ReviewConfig,
    diagnostics::{DiagnosticsSnapshot, IngestionDiagnostics},
    export,
    filter::RelevanceFilter,
    pipeline::{Pipeline, RefreshOutcome, RefreshReport, SearchOutcome},
    record::{records_from_values, PublicationType, Record},
    scoring::Scorer,
    storage::{default_data_dir, FileStore},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Living literature review - multi-source ingestion, filtering and scoring
#[derive(Parser)]
#[command(name = "livingreview")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// JSON config file overriding the built-in term lists
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the persisted collection (default: ~/.livingreview)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search across all sources and print the ranked results
    Search {
        /// Search expression
        term: String,

        /// Also insert the accepted records into the collection
        #[arg(long)]
        save: bool,

        /// Number of results to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Search every priority keyword and entity, then insert what is new
    Refresh {
        /// Refresh even if the collection was updated recently
        #[arg(short, long)]
        force: bool,
    },

    /// List stored records
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Number of records to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print collection statistics
    Diagnostics {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export stored records
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Delete every stored record
    Clear,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Text matched against title, authors and abstract
    #[arg(short, long)]
    search: Option<String>,

    /// Exact publication year
    #[arg(short, long)]
    year: Option<i32>,

    /// Publication type (journal, conference, book, report, working-paper)
    #[arg(short = 't', long = "type")]
    pub_type: Option<PublicationType>,

    /// relevance, date, citations or impact
    #[arg(long, default_value = "relevance")]
    sort: SortKey,
}

impl FilterArgs {
    fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            search: self.search.clone(),
            year: self.year,
            pub_type: self.pub_type,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Ris,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = ReviewConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load config")?;
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    match cli.command {
        Commands::Search { term, save, limit } => {
            run_search(&config, &data_dir, &term, save, limit).await
        }
        Commands::Refresh { force } => run_refresh(&config, &data_dir, force).await,
        Commands::List { filter, limit } => run_list(&config, &data_dir, &filter, limit),
        Commands::Diagnostics { json } => run_diagnostics(&config, &data_dir, json),
        Commands::Export { format, output, filter } => {
            run_export(&config, &data_dir, format, output.as_deref(), &filter)
        }
        Commands::Clear => {
            let mut collection = open_collection(&config, &data_dir)?;
            let removed = collection.len();
            collection.clear()?;
            println!("Removed {} records from {:?}", removed, data_dir);
            Ok(())
        }
        Commands::Serve { port, host } => run_server(config, data_dir, host, port).await,
    }
}

fn open_collection(config: &ReviewConfig, data_dir: &Path) -> Result<Collection<FileStore>> {
    let store = FileStore::with_dir(data_dir.to_path_buf())
        .with_context(|| format!("Failed to open data directory {:?}", data_dir))?;
    Collection::load(store, Scorer::from_config(config)).context("Failed to load collection")
}

// ============================================================================
// CLI Commands
// ============================================================================

async fn run_search(
    config: &ReviewConfig,
    data_dir: &Path,
    term: &str,
    save: bool,
    limit: usize,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    println!("Searching {} for: {}", pipeline.source_names().join(", "), term);

    let outcome = pipeline.search(term).await;
    println!(
        "{} of {} sources answered, {} fetched, {} accepted",
        outcome.sources_succeeded,
        outcome.sources_total,
        outcome.diagnostics.pre_filter_total,
        outcome.diagnostics.post_filter_total
    );
    print_funnel(&outcome.diagnostics);
    print_records(&outcome.accepted, limit);

    if save {
        let mut collection = open_collection(config, data_dir)?;
        let accepted = outcome.accepted.len();
        let added = collection.insert_batch(outcome.accepted)?;
        collection.record_run(outcome.diagnostics)?;
        println!("\nSaved {} new of {} accepted records", added, accepted);
    }
    Ok(())
}

fn print_funnel(diagnostics: &IngestionDiagnostics) {
    for funnel in diagnostics.funnel() {
        println!("  {:<18} {} -> {}", funnel.source, funnel.pre, funnel.post);
    }
}

async fn run_refresh(config: &ReviewConfig, data_dir: &Path, force: bool) -> Result<()> {
    let mut collection = open_collection(config, data_dir)?;
    if !force && !collection.is_stale(Utc::now(), config.search.stale_after_hours) {
        println!(
            "Collection was updated within the last {} hours; use --force to refresh anyway",
            config.search.stale_after_hours
        );
        return Ok(());
    }

    let terms = config.refresh_terms();
    println!("Refreshing with {} searches...", terms.len());

    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.refresh(&mut collection, &terms).await?;
    println!("{}", refresh_message(&report));
    if report.outcome() != RefreshOutcome::ConnectivityFailure {
        print_funnel(&report.diagnostics);
    }
    println!("Collection now holds {} records", collection.len());
    Ok(())
}

fn refresh_message(report: &RefreshReport) -> String {
    match report.outcome() {
        RefreshOutcome::ConnectivityFailure => {
            "Could not reach any source; the collection is unchanged".to_string()
        }
        RefreshOutcome::NoNewRecords => format!(
            "No new records ({} considered, {}/{} searches answered)",
            report.considered, report.searches_succeeded, report.searches_total
        ),
        RefreshOutcome::Added(n) => format!(
            "Added {} new records ({} considered, {}/{} searches answered)",
            n, report.considered, report.searches_succeeded, report.searches_total
        ),
    }
}

fn run_list(config: &ReviewConfig, data_dir: &Path, args: &FilterArgs, limit: usize) -> Result<()> {
    let collection = open_collection(config, data_dir)?;
    let records = collection.query(&args.to_filter(), args.sort);
    println!("{} of {} records match", records.len(), collection.len());
    print_records(&records, limit);
    Ok(())
}

fn print_records(records: &[Record], limit: usize) {
    for (i, r) in records.iter().take(limit).enumerate() {
        let year = r.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
        println!("\n{:>3}. [{}] {}", i + 1, r.relevance_score, r.title);
        println!("     {} ({}) - {} citations - {}", r.authors, year, r.citations, r.source);
        if let Some(doi) = &r.doi {
            println!("     https://doi.org/{}", doi);
        }
    }
}

fn run_diagnostics(config: &ReviewConfig, data_dir: &Path, json: bool) -> Result<()> {
    let collection = open_collection(config, data_dir)?;
    let filter = RelevanceFilter::from_config(config);
    let snap = DiagnosticsSnapshot::compute(
        collection.records(),
        collection.gray_literature().len(),
        collection.last_run(),
        Utc::now(),
        &filter,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
        return Ok(());
    }

    println!("Total records: {} ({} gray literature)", snap.total, snap.gray_literature);
    if let Some(last) = collection.stats().last_update {
        println!("Last update:   {}", last.to_rfc3339());
    }
    println!("New (30/90 days): {} / {}", snap.added_last_30_days, snap.added_last_90_days);
    if let Some(range) = snap.year_range {
        println!("Years:         {}-{}", range.min, range.max);
    }
    println!("Citations:     mean {:.1}, median {}", snap.citation_mean, snap.citation_median);

    if !snap.ingestion.is_empty() {
        println!("\nLast run (fetched -> accepted):");
        for funnel in &snap.ingestion {
            println!("  {:<18} {} -> {}", funnel.source, funnel.pre, funnel.post);
        }
    }

    println!("\nSources:");
    for s in &snap.source_distribution {
        println!("  {:<18} {:>5} ({:.1}%)", s.label, s.count, s.percent);
    }
    println!("\nTypes:");
    for s in &snap.type_breakdown {
        println!("  {:<18} {:>5} ({:.1}%)", s.label, s.count, s.percent);
    }
    println!(
        "\nMissing: abstract {}, year {}, DOI {}, URL {}",
        snap.missing.abstract_text, snap.missing.year, snap.missing.doi, snap.missing.url
    );
    println!(
        "Coverage: abstract {:.1}%, DOI {:.1}%, URL {:.1}%, ahead of print {:.1}%",
        snap.coverage.abstract_text,
        snap.coverage.doi,
        snap.coverage.url,
        snap.coverage.ahead_of_print
    );

    println!("\nCategories:");
    for (category, count) in &snap.category_counts {
        println!("  {:<26} {}", category, count);
    }
    println!("\nTop venues:");
    for v in &snap.top_venues {
        println!("  {:<50} {}", v.label, v.count);
    }
    println!("\nTop authors:");
    for a in &snap.top_authors {
        println!("  {:<30} {}", a.label, a.count);
    }
    if !snap.top_keywords.is_empty() {
        let keywords: Vec<String> = snap
            .top_keywords
            .iter()
            .map(|k| format!("{} ({})", k.label, k.count))
            .collect();
        println!("\nKeywords: {}", keywords.join(", "));
    }
    Ok(())
}

fn run_export(
    config: &ReviewConfig,
    data_dir: &Path,
    format: ExportFormat,
    output: Option<&Path>,
    args: &FilterArgs,
) -> Result<()> {
    let collection = open_collection(config, data_dir)?;
    let records = collection.query(&args.to_filter(), args.sort);
    let content = match format {
        ExportFormat::Csv => export::to_csv(&records)?,
        ExportFormat::Ris => export::to_ris(&records),
    };

    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Exported {} records to {:?}", records.len(), path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

struct AppState {
    config: ReviewConfig,
    pipeline: Pipeline,
    collection: Mutex<Collection<FileStore>>,
}

async fn run_server(config: ReviewConfig, data_dir: PathBuf, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, data_dir = ?data_dir, "Starting HTTP server");

    let app_state = Arc::new(AppState {
        pipeline: Pipeline::from_config(&config)?,
        collection: Mutex::new(open_collection(&config, &data_dir)?),
        config,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .route("/refresh", post(refresh_handler))
        .route("/records", get(list_handler).post(insert_handler))
        .route("/diagnostics", get(diagnostics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

/// Storage failure surfaced to an HTTP client.
struct AppError(livingreview::ReviewError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl From<livingreview::ReviewError> for AppError {
    fn from(e: livingreview::ReviewError) -> Self {
        Self(e)
    }
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    term: String,
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Json<SearchOutcome> {
    info!(term = %req.term, "Search request");
    let outcome = state.pipeline.search(&req.term).await;
    if let Err(e) = state.collection.lock().await.record_run(outcome.diagnostics.clone()) {
        warn!(error = %e, "Could not store search diagnostics");
    }
    Json(outcome)
}

#[derive(Debug, Default, Deserialize)]
struct RefreshRequest {
    /// Defaults to the configured priority searches
    terms: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    outcome: RefreshOutcome,
    message: String,
    report: RefreshReport,
}

async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<RefreshResponse>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let terms = req.terms.unwrap_or_else(|| state.config.refresh_terms());
    info!(searches = terms.len(), "Refresh request");

    let report = {
        let mut collection = state.collection.lock().await;
        state.pipeline.refresh(&mut *collection, &terms).await?
    };

    Ok(Json(RefreshResponse {
        outcome: report.outcome(),
        message: refresh_message(&report),
        report,
    }))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    search: Option<String>,
    year: Option<i32>,
    #[serde(rename = "type")]
    pub_type: Option<PublicationType>,
    #[serde(default)]
    sort: SortKey,
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<Vec<Record>> {
    let filter = RecordFilter {
        search: params.search,
        year: params.year,
        pub_type: params.pub_type,
    };
    let collection = state.collection.lock().await;
    Json(collection.query(&filter, params.sort))
}

#[derive(Debug, Serialize)]
struct InsertResponse {
    added: usize,
    considered: usize,
}

/// Elements that are not JSON objects are skipped; malformed fields degrade.
async fn insert_handler(
    State(state): State<Arc<AppState>>,
    Json(values): Json<Vec<serde_json::Value>>,
) -> Result<Json<InsertResponse>, AppError> {
    let considered = values.len();
    let records = records_from_values(values, "POST /records");
    let added = state.collection.lock().await.insert_batch(records)?;
    Ok(Json(InsertResponse { added, considered }))
}

async fn diagnostics_handler(State(state): State<Arc<AppState>>) -> Json<DiagnosticsSnapshot> {
    let collection = state.collection.lock().await;
    Json(DiagnosticsSnapshot::compute(
        collection.records(),
        collection.gray_literature().len(),
        collection.last_run(),
        Utc::now(),
        state.pipeline.filter(),
    ))
}

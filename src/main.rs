use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;

use archive_explorer::facets::ranker::{Facet, FacetRanking};
use archive_explorer::{
    DispatchUpdate, EngineConfig, FileTypeFilter, Library, MonthKey, QueryDispatcher, SortOrder,
};

/// Width of the widest timeline bar, in characters
const HISTOGRAM_WIDTH: f32 = 30.0;

/// Browse a chat media archive by conversation, sender, file type and month
#[derive(Parser, Debug)]
#[command(name = "archive-explorer", version)]
struct Cli {
    /// JSON engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Catalog database (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Conversation id to filter on
    #[arg(long)]
    conversation: Option<i64>,

    /// Sender id to filter on
    #[arg(long)]
    sender: Option<i64>,

    /// all, image, video or gif
    #[arg(long, default_value = "all")]
    file_type: FileTypeFilter,

    /// Month to filter on, as YYYY-MM
    #[arg(long)]
    month: Option<MonthKey>,

    /// Free-text search
    #[arg(long)]
    search: Option<String>,

    /// date-desc, date-asc or sender
    #[arg(long, default_value = "date-desc")]
    sort: SortOrder,

    /// List every conversation and sender, not only the most used
    #[arg(long)]
    all_facets: bool,
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("archive_explorer=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn print_facet<T: Facet>(
    title: &str,
    ranking: &FacetRanking<'_, T>,
    all: bool,
    selected: Option<i64>,
) {
    println!("{title}");
    if let Some(pinned) = ranking.pinned().filter(|_| !all) {
        println!("  * {:>5}  {} [{}]", pinned.usage_count(), pinned.name(), pinned.id());
    }
    let items = if all { ranking.ranked() } else { ranking.top() };
    for item in items {
        let marker = if selected == Some(item.id()) { '*' } else { ' ' };
        println!("  {marker} {:>5}  {} [{}]", item.usage_count(), item.name(), item.id());
    }
    if !all && ranking.needs_browse_all() {
        println!("    ... {} more (--all-facets)", ranking.ranked().len() - ranking.top().len());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(db) = cli.db.clone() {
        config.db_path = Some(db);
    }

    let db_path = config.resolved_db_path()?;
    let library = Library::open(&db_path)
        .with_context(|| format!("failed to open catalog at {}", db_path.display()))?;

    let status = library.import_status()?;
    info!(
        media = status.media_count,
        conversations = status.conversation_count,
        "catalog ready"
    );
    if !status.has_data {
        println!("Catalog at {} is empty. Import an export first.", db_path.display());
        return Ok(());
    }

    let mut dispatcher = QueryDispatcher::new(Arc::new(library), &config);
    dispatcher.refresh_facets().await?;

    dispatcher.select_conversation(cli.conversation);
    dispatcher.select_sender(cli.sender);
    dispatcher.set_file_type(cli.file_type);
    dispatcher.select_month(cli.month);
    dispatcher.set_sort(cli.sort);
    if let Some(search) = &cli.search {
        dispatcher.search_input(search.as_str());
        dispatcher.submit_search();
    }
    if dispatcher.latest_request().is_none() {
        dispatcher.reload();
    }

    if let Some(DispatchUpdate::Failed { reason, .. }) = dispatcher.settle().await {
        bail!("query failed: {reason}");
    }

    let filters = dispatcher.filters().clone();
    print_facet(
        "Conversations",
        &dispatcher.conversation_ranking(),
        cli.all_facets,
        filters.conversation(),
    );
    print_facet("Senders", &dispatcher.sender_ranking(), cli.all_facets, filters.sender());

    println!("Timeline");
    for bar in dispatcher.histogram().newest_first() {
        let marker = if bar.selected { '*' } else { ' ' };
        let width = (bar.fraction * HISTOGRAM_WIDTH).round() as usize;
        println!("  {marker} {:<9} {:<30} {}", bar.label, "#".repeat(width), bar.count);
    }

    println!();
    println!(
        "{} results{}",
        dispatcher.result_count(),
        if filters.has_active_filters() { " (filtered)" } else { "" }
    );
    for group in dispatcher.groups() {
        println!("{} ({})", group.label, group.records.len());
        for record in &group.records {
            println!(
                "  {:>6}  {:<5}  {:<20}  {:<20}  {}",
                record.id,
                record.file_type.as_str(),
                record.sender_name,
                record.conversation_name,
                record.locator
            );
        }
    }

    Ok(())
}

//! Roster-Harvest main entry point
//!
//! This is the command-line interface for the Roster-Harvest player profile harvester.

use clap::Parser;
use roster_harvest::config::{load_config_with_hash, Config};
use roster_harvest::output::query_json;
use roster_harvest::storage::{open_storage, shared, RecordQuery, SortField, SortOrder};
use roster_harvest::{CrawlState, Orchestrator};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Roster-Harvest: A polite sport-player profile harvester
///
/// Roster-Harvest walks the configured sources (index → group → leaf),
/// normalizes every player profile it finds and merges it into a SQLite
/// store without losing previously known data.
#[derive(Parser, Debug)]
#[command(name = "roster-harvest")]
#[command(version)]
#[command(about = "A polite sport-player profile harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "query"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "query"])]
    stats: bool,

    /// Print one page of stored records as JSON and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    query: bool,

    /// Seconds between progress lines while crawling
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    status_interval: u64,

    #[command(flatten)]
    filters: QueryArgs,
}

/// Filters used with --query
#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Case-insensitive substring of the player name
    #[arg(long, requires = "query")]
    search: Option<String>,

    /// Exact team
    #[arg(long, requires = "query")]
    group: Option<String>,

    #[arg(long, requires = "query")]
    country: Option<String>,

    /// Exact position
    #[arg(long, requires = "query")]
    role: Option<String>,

    /// Exact source id
    #[arg(long, requires = "query")]
    source: Option<String>,

    /// Exact sport
    #[arg(long, requires = "query")]
    category: Option<String>,

    #[arg(long, requires = "query")]
    min_age: Option<u32>,

    #[arg(long, requires = "query")]
    max_age: Option<u32>,

    /// name, age, weight, height, country, team, position, sport, source, url, created or updated
    #[arg(long, default_value = "name")]
    sort_by: SortField,

    /// asc or desc
    #[arg(long, default_value = "asc")]
    order: SortOrder,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long, default_value_t = roster_harvest::storage::DEFAULT_PER_PAGE)]
    per_page: u32,
}

impl From<QueryArgs> for RecordQuery {
    fn from(args: QueryArgs) -> Self {
        Self {
            search: args.search,
            group: args.group,
            country: args.country,
            role: args.role,
            source_id: args.source,
            category: args.category,
            min_age: args.min_age,
            max_age: args.max_age,
            sort_by: args.sort_by,
            order: args.order,
            page: args.page,
            per_page: args.per_page,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.query {
        handle_query(&config, cli.filters.into())?;
    } else {
        let state = handle_crawl(&config, &config_hash, cli.status_interval).await?;
        if state == CrawlState::Failed {
            return Err("crawl run failed".into());
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("roster_harvest=info,warn"),
            1 => EnvFilter::new("roster_harvest=debug,info"),
            2 => EnvFilter::new("roster_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Roster-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Backoff base: {}ms", config.crawler.backoff_base_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Leaf delay: {}ms", config.crawler.leaf_delay_ms);
    println!("  Group delay: {}ms", config.crawler.group_delay_ms);
    println!("  Enrich leaves: {}", config.crawler.enrich_leaves);
    if config.crawler.refetch_window_hours > 0 {
        println!("  Refetch window: {}h", config.crawler.refetch_window_hours);
    }

    println!("\nUser Agent:");
    println!("  {}", roster_harvest::crawler::user_agent(&config.user_agent));

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} [{}] ({} units)", source.id, source.category, source.units.len());
        for unit in &source.units {
            println!("    * {}: {}", unit.label, unit.url);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling {} top-level units",
        config.sources.iter().map(|s| s.units.len()).sum::<usize>()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use roster_harvest::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --query mode: prints one page of records as JSON
fn handle_query(config: &Config, query: RecordQuery) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    println!("{}", query_json(&storage, &query)?);
    Ok(())
}

/// Handles the main crawl operation
///
/// Logs a progress line every `status_interval` seconds and requests a
/// cooperative stop on Ctrl-C.
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    status_interval: u64,
) -> Result<CrawlState, Box<dyn std::error::Error>> {
    tracing::info!(
        "Sources: {}, top-level units: {}",
        config.sources.len(),
        config.sources.iter().map(|s| s.units.len()).sum::<usize>()
    );

    let storage = shared(open_storage(Path::new(&config.output.database_path))?);
    let orchestrator = Orchestrator::from_config(config, storage, config_hash)?;
    let mut handle = orchestrator.start()?;

    let mut ticker = tokio::time::interval(Duration::from_secs(status_interval.max(1)));
    ticker.tick().await;
    let mut stopping = false;

    let state = loop {
        tokio::select! {
            joined = &mut handle => break joined?,
            _ = ticker.tick() => {
                let progress = orchestrator.status();
                tracing::info!(
                    "Progress: {} records of ~{} units, at {}, {} recent errors",
                    progress.processed_count,
                    progress.total_units,
                    progress.current_unit.as_deref().unwrap_or("-"),
                    progress.recent_errors.len()
                );
            }
            signal = tokio::signal::ctrl_c(), if !stopping => {
                signal?;
                tracing::info!("Interrupt received, finishing the current step");
                orchestrator.stop();
                stopping = true;
            }
        }
    };

    let progress = orchestrator.status();
    match state {
        CrawlState::Completed => tracing::info!(
            "Crawl completed: {} records processed",
            progress.processed_count
        ),
        CrawlState::Cancelled => tracing::warn!(
            "Crawl cancelled after {} records",
            progress.processed_count
        ),
        other => tracing::error!("Crawl ended in state {}", other),
    }
    for error in &progress.recent_errors {
        tracing::debug!("Recent error: {}", error);
    }

    Ok(state)
}

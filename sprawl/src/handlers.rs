use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use sprawl_core::benchmark::{BenchmarkOutcome, BenchmarkPlan, run_benchmarks};
use sprawl_core::config::Settings;
use sprawl_core::data::SqliteGraphStore;
use sprawl_core::report::generate_benchmark_report;
use sprawl_scanner::fetch::{HttpFetcher, PageFetcher};
use sprawl_scanner::store::MemoryGraphStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, info};

/// Everything the command line can ask for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub async_ms: Option<u64>,
    pub sync_ms: Option<u64>,
    pub verbose: bool,
    pub quiet: bool,
    pub seeds: Vec<String>,
    pub config: Option<PathBuf>,
    pub workers: Option<usize>,
    pub memory: bool,
}

impl RunOptions {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            async_ms: matches.get_one::<u64>("async").copied(),
            sync_ms: matches.get_one::<u64>("sync").copied(),
            verbose: matches.get_flag("verbose"),
            quiet: matches.get_flag("quiet"),
            seeds: matches
                .get_many::<String>("seed")
                .map(|seeds| seeds.cloned().collect())
                .unwrap_or_default(),
            config: matches.get_one::<PathBuf>("config").cloned(),
            workers: matches.get_one::<u16>("workers").map(|n| *n as usize),
            memory: matches.get_flag("memory"),
        }
    }
}

/// Install the fmt subscriber. `--verbose` raises the level to DEBUG,
/// `--quiet` lowers it to WARN.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    // A subscriber may already be installed, e.g. by a test harness.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Merge command-line options over file settings. Flags win.
pub fn build_plan(options: &RunOptions, settings: &Settings) -> BenchmarkPlan {
    let seeds = if options.seeds.is_empty() {
        settings.crawl.seeds.clone()
    } else {
        options.seeds.clone()
    };

    BenchmarkPlan::new(seeds)
        .with_async(options.async_ms.map(Duration::from_millis))
        .with_sync(options.sync_ms.map(Duration::from_millis))
        .with_verbose(options.verbose)
        .with_workers(options.workers.or(settings.crawl.workers))
        .with_max_depth(settings.crawl.max_depth)
        .with_progress(!options.quiet)
}

pub fn print_banner() {
    println!(
        "{}",
        r"
   ___ _ __  _ __ __ ___      _| |
  / __| '_ \| '__/ _` \ \ /\ / / |
  \__ \ |_) | | | (_| |\ V  V /| |
  |___/ .__/|_|  \__,_| \_/\_/ |_|
      |_|"
            .bright_cyan()
    );
    println!(
        "  {} {}\n",
        "deadline-bounded BFS crawler".bright_white(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
}

/// Load settings, run every requested benchmark and return the rendered
/// report. Only a store that cannot be opened is an error.
pub async fn handle_benchmark(options: &RunOptions) -> Result<String> {
    if options.async_ms.is_none() && options.sync_ms.is_none() {
        bail!("at least one of --async or --sync is required");
    }

    let settings = Settings::load(options.config.as_deref()).context("Failed to load settings")?;
    let plan = build_plan(options, &settings);
    debug!("Benchmark plan: {:?}", plan);

    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?);

    let outcomes = if options.memory {
        info!("Using in-memory graph store");
        let store = Arc::new(
            MemoryGraphStore::new().with_clear_on_close(settings.store.clear_on_close),
        );
        run_benchmarks(&plan, store, fetcher).await?
    } else {
        let path = settings.store_path();
        let store = Arc::new(
            SqliteGraphStore::new(&path).with_clear_on_close(settings.store.clear_on_close),
        );
        run_benchmarks(&plan, store, fetcher)
            .await
            .with_context(|| format!("Graph store at {} failed", path.display()))?
    };

    Ok(render_report(&outcomes))
}

fn render_report(outcomes: &[BenchmarkOutcome]) -> String {
    generate_benchmark_report(outcomes)
        .lines()
        .map(|line| {
            if line.starts_with('(') && line.ends_with("CRAWLER") {
                line.bright_cyan().bold().to_string()
            } else if line.contains("URLs crawled.") {
                line.bright_green().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

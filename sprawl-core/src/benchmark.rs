use crate::data::{RunRecord, SqliteGraphStore};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use sprawl_scanner::error::Result;
use sprawl_scanner::fetch::PageFetcher;
use sprawl_scanner::result::TraversalReport;
use sprawl_scanner::store::{GraphStore, MemoryGraphStore, UrlRank};
use sprawl_scanner::sync_crawler::SyncCrawler;
use sprawl_scanner::traversal::{Traversal, TraversalConfig, TraversalState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Number of ranked URLs kept per outcome in verbose runs.
pub const DEFAULT_RANK_LIMIT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    Sync,
    Async,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlMode::Sync => "sync",
            CrawlMode::Async => "async",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CrawlMode::Sync => "SYNC",
            CrawlMode::Async => "ASYNC",
        }
    }
}

/// A graph store that can also keep a history of benchmark runs.
#[async_trait]
pub trait BenchmarkStore: GraphStore {
    /// Persist `run`, returning its id when the store keeps history.
    async fn record_run(&self, run: &RunRecord) -> Result<Option<String>>;
}

#[async_trait]
impl BenchmarkStore for SqliteGraphStore {
    async fn record_run(&self, run: &RunRecord) -> Result<Option<String>> {
        self.insert_run(run).await.map(Some)
    }
}

#[async_trait]
impl BenchmarkStore for MemoryGraphStore {
    async fn record_run(&self, _run: &RunRecord) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Which modes to run, and how.
#[derive(Debug, Clone)]
pub struct BenchmarkPlan {
    pub async_deadline: Option<Duration>,
    pub sync_deadline: Option<Duration>,
    pub verbose: bool,
    pub seeds: Vec<String>,
    pub workers: Option<usize>,
    pub max_depth: Option<usize>,
    pub rank_limit: usize,
    pub show_progress: bool,
}

impl BenchmarkPlan {
    pub fn new(seeds: Vec<String>) -> Self {
        Self {
            async_deadline: None,
            sync_deadline: None,
            verbose: false,
            seeds,
            workers: None,
            max_depth: None,
            rank_limit: DEFAULT_RANK_LIMIT,
            show_progress: false,
        }
    }

    pub fn with_async(mut self, deadline: Option<Duration>) -> Self {
        self.async_deadline = deadline;
        self
    }

    pub fn with_sync(mut self, deadline: Option<Duration>) -> Self {
        self.sync_deadline = deadline;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Requested runs in execution order: sync first, then async.
    pub fn runs(&self) -> Vec<(CrawlMode, Duration)> {
        let mut runs = Vec::new();
        if let Some(deadline) = self.sync_deadline {
            runs.push((CrawlMode::Sync, deadline));
        }
        if let Some(deadline) = self.async_deadline {
            runs.push((CrawlMode::Async, deadline));
        }
        runs
    }

    pub fn traversal_config(&self, deadline: Duration) -> TraversalConfig {
        let mut config =
            TraversalConfig::from_seeds(self.seeds.clone(), deadline).with_max_depth(self.max_depth);
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config
    }
}

/// Result of one benchmarked mode.
#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    pub mode: CrawlMode,
    pub deadline: Duration,
    /// URLs in the store after the run.
    pub nodes: u64,
    pub report: TraversalReport,
    /// Highest in-degree URLs; only gathered for verbose plans.
    pub ranks: Option<Vec<UrlRank>>,
    pub run_id: Option<String>,
}

/// Run every requested mode against `store`, each with its own store
/// lifecycle. A store that fails to initialize aborts the whole benchmark;
/// later store failures are logged and the run carries on.
pub async fn run_benchmarks<S>(
    plan: &BenchmarkPlan,
    store: Arc<S>,
    fetcher: Arc<dyn PageFetcher>,
) -> Result<Vec<BenchmarkOutcome>>
where
    S: BenchmarkStore + 'static,
{
    let mut outcomes = Vec::new();

    for (mode, deadline) in plan.runs() {
        info!("({}) crawler init, deadline {}ms", mode.label(), deadline.as_millis());
        let outcome = run_one(plan, mode, deadline, store.clone(), fetcher.clone()).await?;
        info!(
            "({}) Benchmark for {}ms -> {} URLs crawled.",
            mode.label(),
            deadline.as_millis(),
            outcome.nodes
        );
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

async fn run_one<S>(
    plan: &BenchmarkPlan,
    mode: CrawlMode,
    deadline: Duration,
    store: Arc<S>,
    fetcher: Arc<dyn PageFetcher>,
) -> Result<BenchmarkOutcome>
where
    S: BenchmarkStore + 'static,
{
    store.initialize().await?;
    if let Err(e) = store.clear_all().await {
        warn!("({}) Failed to clear graph store: {}", mode.label(), e);
    }

    let config = plan.traversal_config(deadline);
    let graph: Arc<dyn GraphStore> = store.clone();
    let spinner = plan.show_progress.then(|| progress_spinner(mode, deadline));
    let started_at = chrono::Utc::now().timestamp();

    let report = match mode {
        CrawlMode::Sync => SyncCrawler::new(fetcher, graph).run(&config).await,
        CrawlMode::Async => {
            let traversal = Traversal::new(config.clone(), fetcher, graph);
            match &spinner {
                Some(pb) => {
                    let watcher = watch_levels(&traversal, pb.clone());
                    let report = traversal.run().await;
                    watcher.abort();
                    report
                }
                None => traversal.run().await,
            }
        }
    };

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let nodes = match store.count_nodes().await {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!("({}) Failed to count crawled URLs: {}", mode.label(), e);
            0
        }
    };
    let ranks = if plan.verbose {
        match store.rank_by_in_degree().await {
            Ok(mut ranks) => {
                ranks.truncate(plan.rank_limit);
                Some(ranks)
            }
            Err(e) => {
                warn!("({}) Failed to rank crawled URLs: {}", mode.label(), e);
                None
            }
        }
    } else {
        None
    };

    let record = RunRecord {
        id: uuid::Uuid::new_v4().to_string(),
        mode: mode.as_str().to_string(),
        seeds: config.normalized_seeds(),
        deadline_ms: deadline.as_millis() as u64,
        started_at,
        finished_at: chrono::Utc::now().timestamp(),
        nodes,
    };
    let run_id = match store.record_run(&record).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to record {} benchmark run: {}", mode.as_str(), e);
            None
        }
    };

    if let Err(e) = store.close().await {
        warn!("({}) Failed to close graph store: {}", mode.label(), e);
    }

    Ok(BenchmarkOutcome {
        mode,
        deadline,
        nodes,
        report,
        ranks,
        run_id,
    })
}

fn progress_spinner(mode: CrawlMode, deadline: Duration) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!(
        "({}) crawling for {}ms...",
        mode.label(),
        deadline.as_millis()
    ));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Mirror the traversal's level transitions onto the spinner.
fn watch_levels(traversal: &Traversal, pb: ProgressBar) -> tokio::task::JoinHandle<()> {
    let mut state = traversal.subscribe_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            match current {
                TraversalState::Dispatching(depth) | TraversalState::AwaitingLevel(depth) => {
                    pb.set_message(format!("(ASYNC) crawling level {}...", depth));
                }
                TraversalState::Idle | TraversalState::Stopped => {}
            }
        }
    })
}

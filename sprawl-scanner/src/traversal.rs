use crate::admission::{Admission, admit};
use crate::extract::normalize_url;
use crate::fetch::{PageFetcher, default_pool_size};
use crate::registry::VisitedRegistry;
use crate::result::{StopReason, TraversalReport, TraversalStats};
use crate::store::GraphStore;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Immutable settings for one traversal.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    pub seeds: Vec<String>,
    /// Wall-clock budget measured from the start of `run`.
    pub deadline: Duration,
    /// Size of the fetch worker pool.
    pub workers: usize,
    /// Number of levels to dispatch; `None` is unbounded.
    pub max_depth: Option<usize>,
}

impl TraversalConfig {
    pub fn new(seed: impl Into<String>, deadline: Duration) -> Self {
        Self::from_seeds(vec![seed.into()], deadline)
    }

    pub fn from_seeds(seeds: Vec<String>, deadline: Duration) -> Self {
        Self {
            seeds,
            deadline,
            workers: default_pool_size(),
            max_depth: None,
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<String>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Normalized, valid seeds in their original order, without repeats.
    pub fn normalized_seeds(&self) -> Vec<String> {
        let mut seeds: Vec<String> = Vec::new();
        for raw in &self.seeds {
            match normalize_url(raw) {
                Some(url) if !seeds.contains(&url) => seeds.push(url),
                Some(_) => {}
                None => warn!("Ignoring invalid seed URL {:?}", raw),
            }
        }
        seeds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    Idle,
    Dispatching(usize),
    AwaitingLevel(usize),
    Stopped,
}

/// Cloneable handle for the two cancellation tiers.
///
/// `stop` prevents further dispatch and cuts the current level wait short,
/// leaving in-flight fetches to finish on their own. `force_stop` also
/// closes the worker pool, aborts every outstanding chain and clears the
/// registry and frontier.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    graceful: CancellationToken,
    force: CancellationToken,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.graceful.cancel();
    }

    pub fn force_stop(&self) {
        self.force.cancel();
        self.graceful.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.graceful.is_cancelled()
    }

    pub fn is_force_stopped(&self) -> bool {
        self.force.is_cancelled()
    }
}

enum LevelOutcome {
    Complete,
    DeadlineElapsed,
    StopRequested,
    ForceStopped,
}

/// Everything a per-URL chain needs, cheap to clone into a task.
#[derive(Clone)]
struct ChainContext {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn GraphStore>,
    registry: Arc<VisitedRegistry>,
    next_frontier: Arc<Mutex<Vec<String>>>,
    pool: Arc<Semaphore>,
    stats: Arc<TraversalStats>,
}

/// Level-synchronized concurrent BFS over the link graph.
///
/// Each instance owns its registry, worker pool and store handle, so
/// independent traversals can run side by side.
pub struct Traversal {
    config: TraversalConfig,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn GraphStore>,
    registry: Arc<VisitedRegistry>,
    frontier: Arc<Mutex<Vec<String>>>,
    pool: Arc<Semaphore>,
    stop: StopHandle,
    state: watch::Sender<TraversalState>,
}

impl Traversal {
    pub fn new(
        config: TraversalConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn GraphStore>,
    ) -> Self {
        let pool = Arc::new(Semaphore::new(config.workers.max(1)));
        let (state, _) = watch::channel(TraversalState::Idle);

        Self {
            config,
            fetcher,
            store,
            registry: Arc::new(VisitedRegistry::new()),
            frontier: Arc::new(Mutex::new(Vec::new())),
            pool,
            stop: StopHandle::new(),
            state,
        }
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    pub fn registry(&self) -> &VisitedRegistry {
        &self.registry
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> TraversalState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TraversalState> {
        self.state.subscribe()
    }

    /// Graceful stop: no new levels or chains are dispatched.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Hard stop: abandon all outstanding work immediately.
    pub fn force_stop(&self) {
        self.stop.force_stop();
        self.pool.close();
        self.registry.clear();
    }

    /// Run the traversal to a terminal state.
    ///
    /// Never fails: fetch and persistence errors are absorbed per chain, and
    /// the deadline is reported as a stop reason.
    pub async fn run(&self) -> TraversalReport {
        let started = Instant::now();
        let deadline_at = started + self.config.deadline;
        let stats = Arc::new(TraversalStats::default());

        self.registry.clear();
        self.frontier.lock().await.clear();

        let mut level: Vec<String> = Vec::new();
        for seed in self.config.normalized_seeds() {
            if self.registry.seed(&seed) {
                level.push(seed);
            }
        }

        info!(
            "Starting traversal of {} seed(s) with {} workers, deadline {:?}",
            level.len(),
            self.config.workers,
            self.config.deadline
        );

        let context = ChainContext {
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
            next_frontier: self.frontier.clone(),
            pool: self.pool.clone(),
            stats: stats.clone(),
        };

        let mut depth = 0;
        let mut levels_completed = 0;

        let reason = loop {
            if level.is_empty() {
                break StopReason::FrontierExhausted;
            }
            if self.stop.is_force_stopped() {
                break StopReason::ForceStopped;
            }
            if self.stop.is_stopped() {
                break StopReason::StopRequested;
            }
            if Instant::now() >= deadline_at {
                break StopReason::DeadlineElapsed;
            }
            if self.config.max_depth.is_some_and(|max| depth >= max) {
                break StopReason::DepthLimit;
            }

            self.set_state(TraversalState::Dispatching(depth));
            debug!("Dispatching level {} with {} URL(s)", depth, level.len());

            let mut chains = JoinSet::new();
            for url in std::mem::take(&mut level) {
                if self.stop.is_stopped() {
                    debug!("Stop requested, not launching remaining chains of level {}", depth);
                    break;
                }
                chains.spawn(process_url(context.clone(), url));
            }

            self.set_state(TraversalState::AwaitingLevel(depth));

            match self.await_level(&mut chains, deadline_at).await {
                LevelOutcome::Complete => {}
                LevelOutcome::DeadlineElapsed => {
                    info!("Deadline elapsed during level {}, abandoning {} chain(s)", depth, chains.len());
                    chains.abort_all();
                    break StopReason::DeadlineElapsed;
                }
                LevelOutcome::StopRequested => {
                    info!("Stop requested during level {}", depth);
                    chains.detach_all();
                    break StopReason::StopRequested;
                }
                LevelOutcome::ForceStopped => {
                    chains.abort_all();
                    break StopReason::ForceStopped;
                }
            }

            levels_completed += 1;
            depth += 1;
            level = std::mem::take(&mut *self.frontier.lock().await);
        };

        if reason == StopReason::ForceStopped {
            self.pool.close();
            self.registry.clear();
            self.frontier.lock().await.clear();
        }

        self.set_state(TraversalState::Stopped);

        let report = stats.report(
            reason,
            levels_completed,
            self.registry.len(),
            started.elapsed(),
        );
        info!(
            "Traversal stopped ({}) after {} level(s): {} pages, {} edges persisted",
            report.stop_reason, report.levels_completed, report.pages_requested, report.edges_persisted
        );
        report
    }

    /// The level barrier: every chain joined, or the deadline or a stop
    /// request cuts the wait short.
    async fn await_level(&self, chains: &mut JoinSet<()>, deadline_at: Instant) -> LevelOutcome {
        let drain = async {
            while let Some(joined) = chains.join_next().await {
                if let Err(e) = joined
                    && !e.is_cancelled()
                {
                    warn!("Traversal chain failed: {}", e);
                }
            }
        };

        tokio::select! {
            biased;
            _ = self.stop.force.cancelled() => LevelOutcome::ForceStopped,
            _ = drain => LevelOutcome::Complete,
            _ = tokio::time::sleep_until(deadline_at) => LevelOutcome::DeadlineElapsed,
            _ = self.stop.graceful.cancelled() => LevelOutcome::StopRequested,
        }
    }

    fn set_state(&self, state: TraversalState) {
        self.state.send_replace(state);
    }
}

/// One chain: fetch `url`, admit its links, persist admitted edges and
/// queue newly discovered children for the next level.
async fn process_url(ctx: ChainContext, url: String) {
    let links = {
        let Ok(_permit) = ctx.pool.clone().acquire_owned().await else {
            debug!("Worker pool closed, skipping {}", url);
            return;
        };
        ctx.fetcher.fetch_links(&url).await
    };
    TraversalStats::bump(&ctx.stats.pages_requested);

    let mut admitted = Vec::new();
    let mut discovered = Vec::new();

    for child in links {
        match admit(&ctx.registry, &url, &child) {
            Admission::Tree => {
                TraversalStats::bump(&ctx.stats.tree_edges);
                discovered.push(child.clone());
                admitted.push(child);
            }
            Admission::NonTree => {
                TraversalStats::bump(&ctx.stats.non_tree_edges);
                admitted.push(child);
            }
            Admission::Dropped => {
                TraversalStats::bump(&ctx.stats.dropped_edges);
                debug!("Dropped edge {} -> {}", url, child);
            }
        }
    }

    if !discovered.is_empty() {
        ctx.next_frontier.lock().await.extend(discovered);
    }

    let writes = admitted
        .iter()
        .map(|child| ctx.store.merge_edge(&url, child));
    let results = join_all(writes).await;

    for (child, result) in admitted.iter().zip(results) {
        match result {
            Ok(()) => TraversalStats::bump(&ctx.stats.edges_persisted),
            Err(e) => {
                TraversalStats::bump(&ctx.stats.persist_failures);
                warn!("Failed to persist edge {} -> {}: {}", url, child, e);
            }
        }
    }
}

use crate::admission::{Admission, admit};
use crate::fetch::PageFetcher;
use crate::registry::VisitedRegistry;
use crate::result::{StopReason, TraversalReport, TraversalStats};
use crate::store::GraphStore;
use crate::traversal::TraversalConfig;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Sequential reference crawler used as the benchmark baseline.
///
/// Same registry, admission policy and store as [`Traversal`](crate::Traversal),
/// but one page at a time from a FIFO queue. The deadline is checked before
/// every page, and a fetch still running when it passes is abandoned.
pub struct SyncCrawler {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn GraphStore>,
    registry: VisitedRegistry,
}

impl SyncCrawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn GraphStore>) -> Self {
        Self {
            fetcher,
            store,
            registry: VisitedRegistry::new(),
        }
    }

    pub fn registry(&self) -> &VisitedRegistry {
        &self.registry
    }

    /// Crawl from `config.seeds` until the queue drains, the deadline
    /// passes or `config.max_depth` is reached. `config.workers` is ignored.
    pub async fn run(&self, config: &TraversalConfig) -> TraversalReport {
        let started = Instant::now();
        let deadline_at = started + config.deadline;
        let stats = TraversalStats::default();

        self.registry.clear();

        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        for seed in config.normalized_seeds() {
            if self.registry.seed(&seed) {
                queue.push_back((seed, 0));
            }
        }

        info!(
            "Starting sequential crawl of {} seed(s), deadline {:?}",
            queue.len(),
            config.deadline
        );

        let mut levels_completed = 0;

        let reason = loop {
            let Some((url, depth)) = queue.pop_front() else {
                break StopReason::FrontierExhausted;
            };

            // Popping the first URL of a deeper level means every earlier
            // level is done.
            levels_completed = levels_completed.max(depth);

            if Instant::now() >= deadline_at {
                info!("Time limit reached, stopping sequential crawl");
                break StopReason::DeadlineElapsed;
            }
            if config.max_depth.is_some_and(|max| depth >= max) {
                break StopReason::DepthLimit;
            }

            let links = match timeout_at(deadline_at, self.fetcher.fetch_links(&url)).await {
                Ok(links) => links,
                Err(_) => {
                    info!("Time limit reached while fetching {}", url);
                    break StopReason::DeadlineElapsed;
                }
            };
            TraversalStats::bump(&stats.pages_requested);

            for child in links {
                let admission = admit(&self.registry, &url, &child);
                match admission {
                    Admission::Tree => TraversalStats::bump(&stats.tree_edges),
                    Admission::NonTree => TraversalStats::bump(&stats.non_tree_edges),
                    Admission::Dropped => {
                        TraversalStats::bump(&stats.dropped_edges);
                        continue;
                    }
                }

                match self.store.merge_edge(&url, &child).await {
                    Ok(()) => TraversalStats::bump(&stats.edges_persisted),
                    Err(e) => {
                        TraversalStats::bump(&stats.persist_failures);
                        warn!("Failed to persist edge {} -> {}: {}", url, child, e);
                    }
                }

                if admission == Admission::Tree {
                    queue.push_back((child, depth + 1));
                }
            }

            if queue.is_empty() {
                levels_completed = depth + 1;
            }
        };

        debug!("Sequential crawl left {} URL(s) queued", queue.len());

        let report = stats.report(
            reason,
            levels_completed,
            self.registry.len(),
            started.elapsed(),
        );
        info!(
            "Sequential crawl stopped ({}): {} pages, {} edges persisted",
            report.stop_reason, report.pages_requested, report.edges_persisted
        );
        report
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Why a traversal reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    FrontierExhausted,
    DeadlineElapsed,
    StopRequested,
    ForceStopped,
    DepthLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::FrontierExhausted => "frontier exhausted",
            StopReason::DeadlineElapsed => "deadline elapsed",
            StopReason::StopRequested => "stop requested",
            StopReason::ForceStopped => "force stopped",
            StopReason::DepthLimit => "depth limit reached",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one traversal run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalReport {
    pub stop_reason: StopReason,
    pub levels_completed: usize,
    /// Pages handed to the fetcher, including ones that failed.
    pub pages_requested: usize,
    pub tree_edges: usize,
    pub non_tree_edges: usize,
    pub dropped_edges: usize,
    pub edges_persisted: usize,
    pub persist_failures: usize,
    pub visited: usize,
    pub elapsed: Duration,
}

/// Counters shared by every chain of a run.
#[derive(Debug, Default)]
pub(crate) struct TraversalStats {
    pub pages_requested: AtomicUsize,
    pub tree_edges: AtomicUsize,
    pub non_tree_edges: AtomicUsize,
    pub dropped_edges: AtomicUsize,
    pub edges_persisted: AtomicUsize,
    pub persist_failures: AtomicUsize,
}

impl TraversalStats {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(
        &self,
        stop_reason: StopReason,
        levels_completed: usize,
        visited: usize,
        elapsed: Duration,
    ) -> TraversalReport {
        TraversalReport {
            stop_reason,
            levels_completed,
            pages_requested: self.pages_requested.load(Ordering::Relaxed),
            tree_edges: self.tree_edges.load(Ordering::Relaxed),
            non_tree_edges: self.non_tree_edges.load(Ordering::Relaxed),
            dropped_edges: self.dropped_edges.load(Ordering::Relaxed),
            edges_persisted: self.edges_persisted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            visited,
            elapsed,
        }
    }
}
